use crate::model::{ListingRecord, StorageError};
use crate::normalizer::merge::{KeyStrategy, MatchKey, MergeOutcome, MergePolicy};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

const LISTING_COLUMNS: &str = "id, title, description, price, year, manufacturer, converter, \
     chassis_model, mileage, length_feet, slide_count, location, featured_image_path";

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and brings the schema up to date.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                match_key TEXT UNIQUE,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price INTEGER,
                year INTEGER,
                manufacturer TEXT,
                converter TEXT,
                location TEXT NOT NULL DEFAULT '',
                featured_image_path TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS listing_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                image_path TEXT NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                UNIQUE (listing_id, image_path)
            );
            ",
        )?;

        // Columns added after the first schema version
        Self::migrate_add_column_if_missing(&conn, "listings", "chassis_model", "TEXT")?;
        Self::migrate_add_column_if_missing(&conn, "listings", "mileage", "INTEGER")?;
        Self::migrate_add_column_if_missing(&conn, "listings", "length_feet", "INTEGER")?;
        Self::migrate_add_column_if_missing(&conn, "listings", "slide_count", "INTEGER")?;
        Self::migrate_add_column_if_missing(&conn, "listing_images", "position", "INTEGER NOT NULL DEFAULT 0")?;

        Ok(Self { conn })
    }

    /// Adds `column` to `table` on databases created before it existed.
    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<bool, StorageError> {
        let present = conn
            .prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?
            .exists(params![table, column])?;
        if present {
            return Ok(false);
        }
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {column_def}"), [])?;
        debug!("Added column {}.{}", table, column);
        Ok(true)
    }

    /// Inserts the record, or merges it into the row sharing its match key.
    /// Runs in one transaction; callers serialize writers through `&mut self`.
    pub fn upsert_listing(
        &mut self,
        record: &ListingRecord,
        strategy: &dyn KeyStrategy,
        policy: &MergePolicy,
    ) -> Result<MergeOutcome, StorageError> {
        let key = strategy.key(record);
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let existing = match &key {
            Some(key) => Self::find_in(&tx, key)?,
            None => None,
        };

        let outcome = match existing {
            Some((id, old)) => {
                let merged = policy.merge(&old, record);
                tx.execute(
                    "UPDATE listings SET
                        title = ?1, description = ?2, price = ?3, year = ?4,
                        manufacturer = ?5, converter = ?6, chassis_model = ?7,
                        mileage = ?8, length_feet = ?9, slide_count = ?10,
                        location = ?11, featured_image_path = ?12, updated_at = ?13
                     WHERE id = ?14",
                    params![
                        &merged.title,
                        &merged.description,
                        merged.price.map(|v| v as i64),
                        merged.year,
                        &merged.manufacturer,
                        &merged.converter,
                        &merged.chassis_model,
                        merged.mileage.map(|v| v as i64),
                        merged.length_feet,
                        merged.slide_count,
                        &merged.location,
                        &merged.featured_image_path,
                        &now,
                        id,
                    ],
                )?;
                Self::save_images(&tx, id, &merged)?;
                debug!("Merged listing {} into row {}", merged.title, id);
                MergeOutcome::Existing
            }
            None => {
                tx.execute(
                    "INSERT INTO listings (
                        match_key, title, description, price, year,
                        manufacturer, converter, chassis_model, mileage, length_feet,
                        slide_count, location, featured_image_path, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                    params![
                        key.as_ref().map(|k| k.to_string()),
                        &record.title,
                        &record.description,
                        record.price.map(|v| v as i64),
                        record.year,
                        &record.manufacturer,
                        &record.converter,
                        &record.chassis_model,
                        record.mileage.map(|v| v as i64),
                        record.length_feet,
                        record.slide_count,
                        &record.location,
                        &record.featured_image_path,
                        &now,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                Self::save_images(&tx, id, record)?;
                debug!("Inserted listing {} as row {}", record.title, id);
                MergeOutcome::New
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Replaces the listing's image rows so their order matches the record.
    fn save_images(conn: &Connection, listing_id: i64, record: &ListingRecord) -> Result<(), StorageError> {
        conn.execute("DELETE FROM listing_images WHERE listing_id = ?1", params![listing_id])?;
        let mut stmt = conn.prepare(
            "INSERT INTO listing_images (listing_id, image_path, is_primary, position) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (listing_id, image_path) DO NOTHING",
        )?;
        if let Some(path) = &record.featured_image_path {
            stmt.execute(params![listing_id, path, true, 0])?;
        }
        for (i, path) in record.additional_image_paths.iter().enumerate() {
            stmt.execute(params![listing_id, path, false, i as i64 + 1])?;
        }
        Ok(())
    }

    fn find_in(conn: &Connection, key: &MatchKey) -> Result<Option<(i64, ListingRecord)>, StorageError> {
        let sql = format!("SELECT {} FROM listings WHERE match_key = ?1", LISTING_COLUMNS);
        let found = conn
            .query_row(&sql, params![key.to_string()], |row| Ok((row.get::<_, i64>(0)?, Self::map_listing(row)?)))
            .optional()?;
        match found {
            Some((id, mut record)) => {
                record.additional_image_paths = Self::additional_images(conn, id)?;
                Ok(Some((id, record)))
            }
            None => Ok(None),
        }
    }

    fn additional_images(conn: &Connection, listing_id: i64) -> Result<Vec<String>, StorageError> {
        let mut stmt = conn.prepare(
            "SELECT image_path FROM listing_images WHERE listing_id = ?1 AND is_primary = 0 ORDER BY position, id",
        )?;
        let paths = stmt
            .query_map(params![listing_id], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;
        Ok(paths)
    }

    pub fn find_by_key(&self, key: &MatchKey) -> Result<Option<ListingRecord>, StorageError> {
        Ok(Self::find_in(&self.conn, key)?.map(|(_, record)| record))
    }

    pub fn get_listing(&self, id: i64) -> Result<ListingRecord, StorageError> {
        let sql = format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS);
        let mut record = self
            .conn
            .query_row(&sql, params![id], Self::map_listing)
            .optional()?
            .ok_or(StorageError::NotFound(id))?;
        record.additional_image_paths = Self::additional_images(&self.conn, id)?;
        Ok(record)
    }

    /// All listings in insertion order.
    pub fn all_listings(&self) -> Result<Vec<ListingRecord>, StorageError> {
        let sql = format!("SELECT {} FROM listings ORDER BY id", LISTING_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, Self::map_listing(row)?)))?;

        let mut listings = Vec::new();
        for row in rows {
            let (id, mut record) = row?;
            record.additional_image_paths = Self::additional_images(&self.conn, id)?;
            listings.push(record);
        }
        Ok(listings)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Maps a row selected with `LISTING_COLUMNS`; images are loaded separately.
    fn map_listing(row: &Row) -> rusqlite::Result<ListingRecord> {
        Ok(ListingRecord {
            title: row.get(1)?,
            description: row.get(2)?,
            price: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
            year: row.get(4)?,
            manufacturer: row.get(5)?,
            converter: row.get(6)?,
            chassis_model: row.get(7)?,
            mileage: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
            length_feet: row.get(9)?,
            slide_count: row.get(10)?,
            location: row.get(11)?,
            featured_image_path: row.get(12)?,
            additional_image_paths: Vec::new(),
        })
    }
}
