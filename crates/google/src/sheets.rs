use async_trait::async_trait;
use huntbot_core::backend::{A1Range, RowUpdate, TabularStore};
use huntbot_core::domain::puzzle::Row;
use huntbot_core::errors::BackendError;
use reqwest::Url;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{send, GoogleApiError, GoogleClient};

/// Values are written exactly as given; channel ids must not be reparsed as
/// numbers.
const VALUE_INPUT_OPTION: &str = "RAW";

/// The puzzle list spreadsheet over the Sheets v4 values API.
#[derive(Clone)]
pub struct GoogleSheetsStore {
    client: GoogleClient,
    spreadsheet_id: String,
    record_range: A1Range,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

impl GoogleSheetsStore {
    /// `record_range` determines the sheet and columns single-row writes target.
    pub fn new(
        base_url: &str,
        access_token: SecretString,
        spreadsheet_id: impl Into<String>,
        record_range: A1Range,
    ) -> Result<Self, BackendError> {
        let client = GoogleClient::new(base_url, access_token).map_err(GoogleApiError::into_store)?;
        Ok(Self { client, spreadsheet_id: spreadsheet_id.into(), record_range })
    }

    fn values_url(&self, range: &str) -> Url {
        self.client.endpoint(&["spreadsheets", &self.spreadsheet_id, "values", range])
    }

    fn append_url(&self, range: &str) -> Url {
        let target = format!("{range}:append");
        self.client.endpoint(&["spreadsheets", &self.spreadsheet_id, "values", &target])
    }

    fn batch_update_url(&self) -> Url {
        self.client.endpoint(&["spreadsheets", &self.spreadsheet_id, "values:batchUpdate"])
    }

    fn row_range(&self, row_index: usize) -> String {
        self.record_range.single_row(row_index).to_string()
    }
}

fn single_row_body(range: &str, row: Row) -> Value {
    json!({ "range": range, "majorDimension": "ROWS", "values": [row] })
}

fn batch_body(ranges: Vec<(String, Row)>) -> Value {
    let data = ranges
        .into_iter()
        .map(|(range, row)| single_row_body(&range, row))
        .collect::<Vec<_>>();
    json!({ "valueInputOption": VALUE_INPUT_OPTION, "data": data })
}

#[async_trait]
impl TabularStore for GoogleSheetsStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, BackendError> {
        let request = self.client.get(self.values_url(range)).query(&[("majorDimension", "ROWS")]);
        let response =
            send(request, "sheets values.get").await.map_err(GoogleApiError::into_store)?;
        let body = response
            .json::<ValueRange>()
            .await
            .map_err(|error| BackendError::Store(format!("unreadable values response: {error}")))?;

        debug!(event_name = "google.sheets.read", range, rows = body.values.len(), "range read");
        Ok(body.values)
    }

    async fn append_row(&self, range: &str, row: Row) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.append_url(range))
            .query(&[
                ("valueInputOption", VALUE_INPUT_OPTION),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "majorDimension": "ROWS", "values": [row] }));
        send(request, "sheets values.append").await.map_err(GoogleApiError::into_store)?;

        debug!(event_name = "google.sheets.appended", range, "row appended");
        Ok(())
    }

    async fn update_row(&self, row_index: usize, row: Row) -> Result<(), BackendError> {
        let range = self.row_range(row_index);
        let request = self
            .client
            .put(self.values_url(&range))
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&single_row_body(&range, row));
        send(request, "sheets values.update").await.map_err(GoogleApiError::into_store)?;

        debug!(event_name = "google.sheets.updated", range = %range, "row updated");
        Ok(())
    }

    async fn batch_update(&self, updates: Vec<RowUpdate>) -> Result<(), BackendError> {
        if updates.is_empty() {
            return Ok(());
        }

        let count = updates.len();
        let ranges = updates
            .into_iter()
            .map(|update| (self.row_range(update.row_index), update.row))
            .collect::<Vec<_>>();
        let request = self.client.post(self.batch_update_url()).json(&batch_body(ranges));
        send(request, "sheets values.batchUpdate").await.map_err(GoogleApiError::into_store)?;

        debug!(event_name = "google.sheets.batch_updated", rows = count, "rows updated in batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use huntbot_core::backend::A1Range;
    use serde_json::json;

    use super::{batch_body, GoogleSheetsStore, ValueRange};

    fn store(range: &str) -> GoogleSheetsStore {
        let range = range.parse::<A1Range>().expect("range");
        GoogleSheetsStore::new(
            "https://sheets.googleapis.com/v4",
            "token".to_owned().into(),
            "sheet-1",
            range,
        )
        .expect("store")
    }

    #[test]
    fn builds_values_endpoints() {
        let store = store("Puzzles!A:G");

        assert_eq!(
            store.values_url("Puzzles!A:B").as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/Puzzles!A:B"
        );
        assert_eq!(
            store.append_url("A:G").as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/A:G:append"
        );
        assert_eq!(
            store.batch_update_url().as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values:batchUpdate"
        );
    }

    #[test]
    fn row_writes_target_the_record_columns() {
        assert_eq!(store("Puzzles!A:G").row_range(12), "Puzzles!A12:G12");
        assert_eq!(store("A2:G").row_range(3), "A3:G3");
    }

    #[test]
    fn batch_body_carries_one_range_per_row() {
        let body = batch_body(vec![
            ("A2:G2".to_owned(), vec![json!(""), json!("Alpha")]),
            ("A4:G4".to_owned(), vec![json!(""), json!("Beta")]),
        ]);

        assert_eq!(body["valueInputOption"], "RAW");
        assert_eq!(body["data"][0]["range"], "A2:G2");
        assert_eq!(body["data"][1]["values"][0][1], "Beta");
    }

    #[test]
    fn missing_values_decode_as_empty() {
        let empty = serde_json::from_str::<ValueRange>(r#"{"range":"A1:G1000"}"#).expect("decode");
        assert!(empty.values.is_empty());

        let rows = serde_json::from_str::<ValueRange>(
            r#"{"range":"A1:G3","values":[["Round","Name"],[],["","Alpha",7]]}"#,
        )
        .expect("decode");
        assert_eq!(rows.values.len(), 3);
        assert_eq!(rows.values[2][2], json!(7));
    }
}
