//! CSV rendering for the export endpoints.

use crate::entities::item::Model as ItemModel;
use crate::errors::ServiceError;
use crate::services::requests::RequestWithItems;
use std::collections::HashMap;
use uuid::Uuid;

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ServiceError> {
    writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(format!("CSV buffer error: {e}")))
}

/// Render items to CSV, one row per item.
pub fn items_to_csv(items: &[ItemModel]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "id",
            "name",
            "quantity",
            "unit",
            "reorder_point",
            "status",
            "archived",
            "created_at",
        ])
        .map_err(|e| ServiceError::InternalError(format!("CSV write error: {e}")))?;

    for item in items {
        writer
            .write_record([
                item.id.to_string(),
                item.name.clone(),
                item.quantity.to_string(),
                item.unit.clone(),
                item.reorder_point.to_string(),
                item.status.as_str().to_string(),
                item.is_archived.to_string(),
                item.created_at.to_rfc3339(),
            ])
            .map_err(|e| ServiceError::InternalError(format!("CSV write error: {e}")))?;
    }

    finish(writer)
}

/// Render requests to CSV, one row per line item; requests without lines
/// still produce a single row.
pub fn requests_to_csv(
    requests: &[RequestWithItems],
    item_names: &HashMap<Uuid, String>,
) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "request_id",
            "requester_name",
            "requester_email",
            "division",
            "section",
            "kind",
            "status",
            "received",
            "item",
            "quantity",
            "created_at",
        ])
        .map_err(|e| ServiceError::InternalError(format!("CSV write error: {e}")))?;

    for row in requests {
        let base = [
            row.request.id.to_string(),
            row.request.requester_name.clone(),
            row.request.requester_email.clone(),
            row.request.division.clone(),
            row.request.section.clone(),
            row.request.kind.as_str().to_string(),
            row.request.status.as_str().to_string(),
            row.request.is_received.to_string(),
        ];
        let created_at = row.request.created_at.to_rfc3339();

        if row.items.is_empty() {
            let mut record = base.to_vec();
            record.push(String::new());
            record.push(String::new());
            record.push(created_at.clone());
            writer
                .write_record(&record)
                .map_err(|e| ServiceError::InternalError(format!("CSV write error: {e}")))?;
            continue;
        }

        for line in &row.items {
            let name = item_names
                .get(&line.item_id)
                .cloned()
                .unwrap_or_else(|| line.item_id.to_string());
            let mut record = base.to_vec();
            record.push(name);
            record.push(line.quantity.to_string());
            record.push(created_at.clone());
            writer
                .write_record(&record)
                .map_err(|e| ServiceError::InternalError(format!("CSV write error: {e}")))?;
        }
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::ItemStatus;
    use crate::entities::request::{self, RequestKind, RequestStatus};
    use crate::entities::request_item;
    use chrono::Utc;

    fn sample_item(name: &str, quantity: i32) -> ItemModel {
        ItemModel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            unit: "pc".to_string(),
            reorder_point: 5,
            status: ItemStatus::derive(quantity, 5, false),
            is_archived: false,
            image_url: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn items_csv_has_header_and_rows() {
        let items = vec![sample_item("Bond paper", 10), sample_item("Stapler", 0)];
        let bytes = items_to_csv(&items).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,name,quantity"));
        assert!(lines[1].contains("Bond paper"));
        assert!(lines[2].contains("OUT_OF_STOCK"));
    }

    #[test]
    fn field_with_comma_is_quoted() {
        let items = vec![sample_item("Folder, long", 3)];
        let bytes = items_to_csv(&items).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"Folder, long\""));
    }

    #[test]
    fn requests_csv_emits_one_row_per_line() {
        let item_a = Uuid::new_v4();
        let item_b = Uuid::new_v4();
        let mut names = HashMap::new();
        names.insert(item_a, "Bond paper".to_string());
        names.insert(item_b, "Stapler".to_string());

        let request_id = Uuid::new_v4();
        let rows = vec![RequestWithItems {
            request: request::Model {
                id: request_id,
                requester_name: "J. Cruz".into(),
                requester_email: "jcruz@example.com".into(),
                division: "HRDO".into(),
                section: "Records".into(),
                kind: RequestKind::SupplyOut,
                status: RequestStatus::Approved,
                is_received: false,
                received_at: None,
                approver_id: Some(Uuid::new_v4()),
                notes: None,
                created_at: Utc::now(),
                updated_at: None,
            },
            items: vec![
                request_item::Model {
                    id: Uuid::new_v4(),
                    request_id,
                    item_id: item_a,
                    quantity: 2,
                },
                request_item::Model {
                    id: Uuid::new_v4(),
                    request_id,
                    item_id: item_b,
                    quantity: 1,
                },
            ],
        }];

        let bytes = requests_to_csv(&rows, &names).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Bond paper"));
        assert!(lines[2].contains("Stapler"));
    }
}
