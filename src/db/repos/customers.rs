use rusqlite::{params, Row};

use super::{execute_update, not_found};
use crate::db::models::{CreateCustomerInput, CustomerRow, CustomerStatus, UpdateCustomerInput};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

fn row_to_customer(row: &Row) -> rusqlite::Result<CustomerRow> {
    Ok(CustomerRow {
        id: row.get("id")?,
        name: row.get("name")?,
        origin: row.get("origin")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        status: row.get("status")?,
        last_contact: row.get("last_contact")?,
        notes: row.get("notes")?,
        assigned_to: row.get("assigned_to")?,
        value: row.get("value")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_all(pool: &DbPool, status: Option<CustomerStatus>) -> Result<Vec<CustomerRow>, AppError> {
    let conn = pool.get()?;
    let customers: Vec<CustomerRow> = match status {
        Some(status) => {
            let mut stmt = conn.prepare(
                "SELECT * FROM customers WHERE status = ?1 ORDER BY updated_at DESC",
            )?;
            let rows: Vec<CustomerRow> = stmt
                .query_map(params![status.as_str()], row_to_customer)?
                .filter_map(|r| r.ok())
                .collect();
            rows
        }
        None => {
            let mut stmt = conn.prepare("SELECT * FROM customers ORDER BY updated_at DESC")?;
            let rows: Vec<CustomerRow> = stmt
                .query_map([], row_to_customer)?
                .filter_map(|r| r.ok())
                .collect();
            rows
        }
    };
    Ok(customers)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<CustomerRow, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM customers WHERE id = ?1",
        params![id],
        row_to_customer,
    )
    .map_err(not_found(format!("Customer {id}")))
}

pub fn create(pool: &DbPool, input: CreateCustomerInput) -> Result<CustomerRow, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let status = input.status.unwrap_or_default();
    let value = input.value.unwrap_or(0.0);

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO customers
         (id, name, origin, email, phone, status, last_contact, notes, assigned_to, value, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,NULL,?7,?8,?9,?10,?10)",
        params![
            id,
            input.name,
            input.origin,
            input.email,
            input.phone,
            status.as_str(),
            input.notes,
            input.assigned_to,
            value,
            now,
        ],
    )?;

    get_by_id(pool, &id)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateCustomerInput) -> Result<CustomerRow, AppError> {
    get_by_id(pool, id)?;

    let status = input.status.map(|s| s.as_str().to_string());

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_field!(input.name, "name", sets, values);
    push_field!(input.origin, "origin", sets, values);
    push_field!(input.email, "email", sets, values);
    push_field!(input.phone, "phone", sets, values);
    push_field!(status, "status", sets, values);
    push_field!(input.notes, "notes", sets, values);
    push_field!(input.assigned_to, "assigned_to", sets, values);
    push_field!(input.value, "value", sets, values);

    execute_update(pool, "customers", id, sets, values)?;
    get_by_id(pool, id)
}

/// Stamp `last_contact` with the current time.
pub fn touch_last_contact(pool: &DbPool, id: &str) -> Result<CustomerRow, AppError> {
    let now = now_timestamp();
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE customers SET last_contact = ?1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Customer {id}")));
    }
    drop(conn);
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM customers WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[test]
    fn test_customer_crud() {
        let pool = init_test_db().unwrap();

        let lead = create(
            &pool,
            CreateCustomerInput {
                name: "Padaria Central".into(),
                origin: Some("instagram".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(lead.status.as_deref(), Some("lead"));
        assert_eq!(lead.value, Some(0.0));
        assert_eq!(lead.last_contact, None);

        let won = update(
            &pool,
            &lead.id,
            UpdateCustomerInput {
                status: Some(CustomerStatus::Customer),
                value: Some(1500.0),
                origin: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(won.status.as_deref(), Some("customer"));
        assert_eq!(won.value, Some(1500.0));
        assert_eq!(won.origin, None);

        let touched = touch_last_contact(&pool, &lead.id).unwrap();
        assert!(touched.last_contact.is_some());

        assert_eq!(get_all(&pool, Some(CustomerStatus::Customer)).unwrap().len(), 1);
        assert!(get_all(&pool, Some(CustomerStatus::Lead)).unwrap().is_empty());

        assert!(delete(&pool, &lead.id).unwrap());
        assert!(get_all(&pool, None).unwrap().is_empty());
    }

    #[test]
    fn test_touch_missing_customer() {
        let pool = init_test_db().unwrap();
        assert!(matches!(
            touch_last_contact(&pool, "ghost"),
            Err(AppError::NotFound(_))
        ));
    }
}
