//! Statement descriptors
//!
//! The compiler hands the transaction manager only what it needs to compute
//! lock waits: the tables a statement reads and writes, and whether it
//! changes the catalog.

/// What the lock coordinator needs to know about a statement
pub trait Statement {
    /// Tables read by the statement
    fn table_names_for_read(&self) -> &[String];

    /// Tables written by the statement
    fn table_names_for_write(&self) -> &[String];

    /// Whether the statement changes catalog structure (DDL)
    fn is_catalog_change(&self) -> bool;
}

/// Plain statement descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementInfo {
    reads: Vec<String>,
    writes: Vec<String>,
    catalog_change: bool,
}

impl StatementInfo {
    /// Statement that only reads `tables`
    pub fn read(tables: &[&str]) -> Self {
        Self {
            reads: tables.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Statement that writes `table`
    pub fn write(table: &str) -> Self {
        Self {
            writes: vec![table.to_string()],
            ..Self::default()
        }
    }

    /// Catalog-changing statement on `table`
    pub fn catalog_change(table: &str) -> Self {
        Self {
            writes: vec![table.to_string()],
            catalog_change: true,
            ..Self::default()
        }
    }

    /// Add tables read by the statement
    pub fn reading(mut self, tables: &[&str]) -> Self {
        self.reads.extend(tables.iter().map(|t| t.to_string()));
        self
    }
}

impl Statement for StatementInfo {
    fn table_names_for_read(&self) -> &[String] {
        &self.reads
    }

    fn table_names_for_write(&self) -> &[String] {
        &self.writes
    }

    fn is_catalog_change(&self) -> bool {
        self.catalog_change
    }
}
