use std::path::{Path, PathBuf};

use serde::ser::{Serialize, Serializer};
use strum::EnumCount;

/// A column of a destination table, in file and table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn column(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type }
}

/// Surrogate key shared by both fact tables.
pub const CLICK_ID: &str = "click_id";

/// Source columns that arrive wrapped in `[` `]`.
pub const BRACKETED_COLUMNS: [&str; 2] = ["ad_group_id", "ad_id"];

const CUSTOMER_COLUMNS: &[Column] = &[
    column("account_number", "varchar"),
    column("customer", "varchar"),
    column("account_name", "varchar"),
    column("account_status", "varchar"),
];

const AD_GROUP_COLUMNS: &[Column] = &[
    column("ad_group_id", "varchar"),
    column("campaign_name", "varchar"),
    column("campaign_status", "varchar"),
    column("ad_group", "varchar"),
    column("ad_group_status", "varchar"),
];

const AD_TYPE_COLUMNS: &[Column] = &[
    column("ad_id", "varchar"),
    column("ad_description", "varchar"),
    column("ad_distribution", "varchar"),
    column("ad_status", "varchar"),
    column("ad_title", "varchar"),
    column("ad_type", "varchar"),
    column("tracking_template", "varchar"),
    column("custom_parameters", "varchar"),
    column("final_mobile_url", "varchar"),
    column("final_url", "varchar"),
    column("display_url", "varchar"),
    column("final_app_url", "varchar"),
    column("destination_url", "varchar"),
];

const AD_SEARCH_COLUMNS: &[Column] = &[
    column(CLICK_ID, "serial"),
    column("account_number", "varchar"),
    column("top_vs_other", "varchar"),
    column("gregorian_date", "date"),
    column("device_type", "varchar"),
    column("device_os", "varchar"),
    column("delivered_match_type", "varchar"),
    column("bidmatchtype", "varchar"),
    column("language", "varchar"),
    column("network", "varchar"),
    column("currency_code", "varchar"),
];

const AD_CLICK_COLUMNS: &[Column] = &[
    column(CLICK_ID, "serial"),
    column("ad_id", "varchar"),
    column("ad_group_id", "varchar"),
    column("account_number", "varchar"),
    column("impressions", "numeric"),
    column("clicks", "numeric"),
    column("spend", "numeric"),
    column("avg_position", "numeric"),
    column("conversions", "numeric"),
    column("assists", "numeric"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Dimension,
    Fact,
}

/// Tables of the star schema. Declaration order is load order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumCount,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Customer,
    AdGroup,
    AdType,
    AdSearch,
    AdClick,
}

impl Table {
    pub const ALL: [Table; Table::COUNT] = [
        Table::Customer,
        Table::AdGroup,
        Table::AdType,
        Table::AdSearch,
        Table::AdClick,
    ];

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Columns in the order they appear in both the CSV file and the table.
    /// The first column is the primary key.
    pub fn columns(self) -> &'static [Column] {
        match self {
            Table::Customer => CUSTOMER_COLUMNS,
            Table::AdGroup => AD_GROUP_COLUMNS,
            Table::AdType => AD_TYPE_COLUMNS,
            Table::AdSearch => AD_SEARCH_COLUMNS,
            Table::AdClick => AD_CLICK_COLUMNS,
        }
    }

    pub fn column_names(self) -> impl Iterator<Item = &'static str> {
        self.columns().iter().map(|c| c.name)
    }

    pub fn kind(self) -> TableKind {
        match self {
            Table::Customer | Table::AdGroup | Table::AdType => TableKind::Dimension,
            Table::AdSearch | Table::AdClick => TableKind::Fact,
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.csv", self.name())
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Mapping from every table to the intermediate CSV file that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFiles {
    paths: [PathBuf; Table::COUNT],
}

impl TableFiles {
    /// `<dir>/<table>.csv` for every table.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            paths: Table::ALL.map(|t| dir.join(t.file_name())),
        }
    }

    pub fn path(&self, table: Table) -> &Path {
        &self.paths[table.index()]
    }

    /// Tables with their files, in load order.
    pub fn iter(&self) -> impl Iterator<Item = (Table, &Path)> {
        Table::ALL.into_iter().map(move |t| (t, self.path(t)))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

impl Serialize for TableFiles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_names_are_snake_case() {
        let names: Vec<&str> = Table::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec!["customer", "ad_group", "ad_type", "ad_search", "ad_click"]
        );
        assert_eq!("ad_search".parse::<Table>().unwrap(), Table::AdSearch);
    }

    #[test]
    fn test_fact_tables_lead_with_click_id() {
        for table in Table::ALL {
            let first = table.columns()[0].name;
            match table.kind() {
                TableKind::Fact => assert_eq!(first, CLICK_ID),
                TableKind::Dimension => assert_ne!(first, CLICK_ID),
            }
        }
    }

    #[test]
    fn test_table_files_in_dir() {
        let files = TableFiles::in_dir(Path::new("/work"));
        assert_eq!(
            files.path(Table::AdGroup),
            Path::new("/work/ad_group.csv")
        );
        assert_eq!(files.paths().count(), 5);

        let order: Vec<Table> = files.iter().map(|(t, _)| t).collect();
        assert_eq!(order, Table::ALL.to_vec());
    }

    #[test]
    fn test_table_files_serialize_as_map() {
        let files = TableFiles::in_dir(Path::new("/work"));

        let json = serde_json::to_value(&files).unwrap();
        assert_eq!(json["customer"], "/work/customer.csv");
        assert_eq!(json["ad_click"], "/work/ad_click.csv");
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
}
