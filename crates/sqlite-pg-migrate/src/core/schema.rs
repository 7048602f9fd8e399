//! Static destination table declarations.
//!
//! The destination layout is declared by hand rather than derived from the
//! source. It is deliberately laxer than the source: identifier columns that
//! can hold values beyond a fixed-width integer are `NUMERIC`.

use serde::{Deserialize, Serialize};

/// One destination column: its name and the SQL type clause used in DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Type clause written after the name in `CREATE TABLE`
    /// (e.g. `NUMERIC`, `SERIAL PRIMARY KEY`).
    pub sql_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }

    /// Whether the column is backed by a sequence (`SERIAL` family).
    pub fn is_serial(&self) -> bool {
        matches!(
            self.type_keyword().as_str(),
            "SERIAL" | "SERIAL4" | "BIGSERIAL" | "SERIAL8" | "SMALLSERIAL" | "SERIAL2"
        )
    }

    fn type_keyword(&self) -> String {
        self.sql_type
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase()
    }
}

/// Destination table declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Destination table name.
    pub name: String,

    /// Source table the rows are extracted from.
    pub source_table: String,

    /// Destination columns, in DDL order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Build a spec from `(name, sql_type)` pairs.
    pub fn new(
        name: impl Into<String>,
        source_table: impl Into<String>,
        columns: &[(&str, &str)],
    ) -> Self {
        Self {
            name: name.into(),
            source_table: source_table.into(),
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(*name, *ty))
                .collect(),
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns backed by a sequence that must be advanced after explicit inserts.
    pub fn serial_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.is_serial())
    }
}

/// Player slot columns `home_player_1..11` and `away_player_1..11`.
fn player_slots() -> Vec<String> {
    ["home", "away"]
        .iter()
        .flat_map(|side| (1..=11).map(move |n| format!("{}_player_{}", side, n)))
        .collect()
}

/// The soccer dataset layout: `Match`, `Player`, `Team` and `League`.
///
/// Load order is the order of this list. None of the tables reference each
/// other, so any order works.
pub fn soccer_tables() -> Vec<TableSpec> {
    let mut matches = TableSpec::new(
        "matches",
        "Match",
        &[
            ("id", "SERIAL PRIMARY KEY"),
            ("country_id", "INTEGER"),
            ("league_id", "INTEGER"),
            ("season", "TEXT"),
            ("stage", "INTEGER"),
            ("date", "TEXT"),
            ("match_api_id", "NUMERIC"),
            ("home_team_api_id", "NUMERIC"),
            ("away_team_api_id", "NUMERIC"),
            ("home_team_goal", "INTEGER"),
            ("away_team_goal", "INTEGER"),
        ],
    );
    matches.columns.extend(
        player_slots()
            .into_iter()
            .map(|name| ColumnSpec::new(name, "NUMERIC")),
    );
    matches.columns.extend(
        [
            "goal",
            "shoton",
            "shotoff",
            "foulcommit",
            "card",
            "cross",
            "corner",
            "possession",
        ]
        .iter()
        .map(|name| ColumnSpec::new(*name, "TEXT")),
    );

    let players = TableSpec::new(
        "players",
        "Player",
        &[
            ("id", "SERIAL PRIMARY KEY"),
            ("player_api_id", "NUMERIC"),
            ("player_name", "TEXT"),
            ("player_fifa_api_id", "NUMERIC"),
            ("birthday", "TEXT"),
            ("height", "FLOAT"),
            ("weight", "INTEGER"),
        ],
    );

    let teams = TableSpec::new(
        "teams",
        "Team",
        &[
            ("id", "SERIAL PRIMARY KEY"),
            ("team_api_id", "NUMERIC"),
            ("team_fifa_api_id", "NUMERIC"),
            ("team_long_name", "TEXT"),
            ("team_short_name", "TEXT"),
        ],
    );

    let leagues = TableSpec::new(
        "leagues",
        "League",
        &[
            ("id", "SERIAL PRIMARY KEY"),
            ("country_id", "INTEGER"),
            ("name", "TEXT"),
        ],
    );

    vec![matches, players, teams, leagues]
}
