use std::io;

use color_eyre::eyre::{Result, eyre};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::props::PurchaseState;

#[derive(Debug, Serialize, Deserialize)]
pub struct CsvOrderRecord {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(rename = "user")]
    pub user_id: String,
    pub item: Option<String>,
    pub amount: Option<Decimal>,
    #[serde(rename = "player")]
    pub player_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Deposit,
    Purchase,
}

/// One line of the purchase report.
#[derive(Debug, Serialize, PartialEq)]
pub struct CsvReportRecord {
    #[serde(rename = "purchase")]
    pub purchase_id: Option<String>,
    #[serde(rename = "user")]
    pub user_id: String,
    pub item: String,
    pub price: Option<Decimal>,
    pub state: PurchaseState,
    pub balance: Decimal,
    pub detail: String,
}

pub fn read_input<D: serde::de::DeserializeOwned>(
    file_path: &str,
) -> Result<impl Iterator<Item = Result<D>>> {
    let reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(file_path)
        .map_err(|e| eyre!("Could not read input file: {}", e))?;

    Ok(reader
        .into_deserialize()
        .map(|r| r.map_err(|ee| eyre!("Error parsing row: {}", ee))))
}

pub fn write_report<W: io::Write>(writer: W, records: &[CsvReportRecord]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);

    for record in records {
        csv_writer.serialize(record).map_err(|e| eyre!(e))?;
    }
    csv_writer.flush()?;

    Ok(())
}
