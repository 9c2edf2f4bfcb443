use crate::device::model::Device;
use crate::device::platform::Platform;
use crate::errors::{
    is_duplicate,
    CrawlError,
};
use log::debug;
use rusqlite::{
    params,
    Connection,
    OptionalExtension,
};
use std::path::Path;
use std::sync::{
    Arc,
    Mutex,
};

/// Which crawl-state table an existence check targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrawlTable {
    /// The to-do table.
    Pending,
    /// The been-there table.
    Visited,
}

impl CrawlTable {
    const fn table_name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Visited => "visited",
        }
    }
}

/// One row of the pending table -- a crawl target plus whatever the advertisement that produced
/// it already told us.
#[derive(Clone, Debug, Default)]
pub struct PendingRecord {
    /// Surrogate id; 0 until stored.
    pub pending_id: i64,
    /// Target management IP (unique).
    pub ip: String,
    /// Claim marker -- true while a worker owns this row.
    pub working: bool,
    /// Advertised device name, when known.
    pub device_name: Option<String>,
    /// Platform tag hint.
    pub platform: Platform,
    /// Advertised system platform string.
    pub system_platform: Option<String>,
    /// Local interface the advertisement arrived on.
    pub source_interface: Option<String>,
    /// Remote interface advertised.
    pub neighbor_interface: Option<String>,
    /// Advertised software string.
    pub software: Option<String>,
    /// The raw advertisement block.
    pub raw_cdp: Option<String>,
}

impl PendingRecord {
    /// A bare seed record: just an IP and a platform hint.
    #[must_use]
    pub fn seed(
        ip: &str,
        platform: Platform,
    ) -> Self {
        Self {
            ip: ip.to_owned(),
            platform,
            ..Self::default()
        }
    }
}

/// One row of the visited table.
#[derive(Clone, Debug, Default)]
pub struct VisitedRecord {
    /// Surrogate id; 0 until stored.
    pub visited_id: i64,
    /// Visited management IP (unique).
    pub ip: String,
    /// Device name discovered during the visit, when any.
    pub device_name: Option<String>,
}

/// The durable crawl state: `pending` and `visited` tables with claim/release semantics. All
/// access funnels through one connection guarded by a mutex; the claim itself runs in a single
/// transaction so concurrent dispatch never hands the same target to two workers.
pub struct CrawlStore {
    conn: Arc<Mutex<Connection>>,
}

impl CrawlStore {
    /// Open (creating as needed) the crawl-state database at `path`.
    ///
    /// # Errors
    ///
    /// Database and filesystem errors.
    pub fn open(path: &Path) -> Result<Self, CrawlError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.create_tables()?;

        Ok(store)
    }

    /// An in-memory store for tests.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.create_tables()?;

        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CrawlError> {
        self.conn
            .lock()
            .map_err(|_| CrawlError::Fatal(String::from("crawl store lock poisoned")))
    }

    fn create_tables(&self) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS pending (
                pending_id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT UNIQUE NOT NULL,
                working INTEGER NOT NULL DEFAULT 0,
                device_name TEXT,
                platform TEXT NOT NULL DEFAULT 'unknown',
                system_platform TEXT,
                source_interface TEXT,
                neighbor_interface TEXT,
                software TEXT,
                raw_cdp TEXT,
                updated TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS visited (
                visited_id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT UNIQUE NOT NULL,
                device_name TEXT,
                updated TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;

        Ok(())
    }

    /// Startup housekeeping: release claims crashed workers left behind, and -- when the
    /// operator asked to ignore prior visits -- clear the visited table entirely.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn startup(
        &self,
        ignore_visited: bool,
    ) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        if ignore_visited {
            conn.execute("DELETE FROM visited", [])?;
        }

        conn.execute("UPDATE pending SET working = 0", [])?;

        Ok(())
    }

    /// Insert a pending row. A duplicate IP is tolerated silently -- enqueueing is idempotent.
    ///
    /// # Errors
    ///
    /// Database errors other than the duplicate constraint.
    pub fn add_pending(
        &self,
        record: &PendingRecord,
    ) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO pending (ip, working, device_name, platform, system_platform,
                                  source_interface, neighbor_interface, software, raw_cdp)
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.ip,
                record.device_name,
                record.platform.as_str(),
                record.system_platform,
                record.source_interface,
                record.neighbor_interface,
                record.software,
                record.raw_cdp,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate(&err) => {
                debug!("pending row for {} already exists, ignoring", record.ip);

                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically claim the next unclaimed pending row (lowest id wins): selects it, flips
    /// `working` to true in the same transaction, and returns it. `None` when everything is
    /// claimed or the table is empty.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn get_next(&self) -> Result<Option<PendingRecord>, CrawlError> {
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;

        let row = tx
            .query_row(
                "SELECT pending_id, ip, device_name, platform, system_platform,
                        source_interface, neighbor_interface, software, raw_cdp
                 FROM pending WHERE working = 0 ORDER BY pending_id LIMIT 1",
                [],
                |row| {
                    Ok(PendingRecord {
                        pending_id: row.get(0)?,
                        ip: row.get(1)?,
                        working: true,
                        device_name: row.get(2)?,
                        platform: Platform::parse(&row.get::<_, String>(3)?),
                        system_platform: row.get(4)?,
                        source_interface: row.get(5)?,
                        neighbor_interface: row.get(6)?,
                        software: row.get(7)?,
                        raw_cdp: row.get(8)?,
                    })
                },
            )
            .optional()?;

        let Some(record) = row else {
            tx.finish()?;

            return Ok(None);
        };

        tx.execute(
            "UPDATE pending SET working = 1 WHERE pending_id = ?1",
            params![record.pending_id],
        )?;

        tx.commit()?;

        Ok(Some(record))
    }

    /// Remove a pending row by id, after processing (success or terminal failure).
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn remove_pending(
        &self,
        pending_id: i64,
    ) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        conn.execute(
            "DELETE FROM pending WHERE pending_id = ?1",
            params![pending_id],
        )?;

        Ok(())
    }

    /// Remove a visited row by IP -- the operator insisting a specific seed be re-crawled.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn remove_visited(
        &self,
        ip: &str,
    ) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM visited WHERE ip = ?1", params![ip])?;

        Ok(())
    }

    /// Insert a visited row. A duplicate IP is tolerated silently.
    ///
    /// # Errors
    ///
    /// Database errors other than the duplicate constraint.
    pub fn add_visited(
        &self,
        record: &VisitedRecord,
    ) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO visited (ip, device_name) VALUES (?1, ?2)",
            params![record.ip, record.device_name],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate(&err) => {
                debug!("visited row for {} already exists, ignoring", record.ip);

                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// True when a row with this IP exists in the given table.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn ip_exists(
        &self,
        ip: &str,
        table: CrawlTable,
    ) -> Result<bool, CrawlError> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE ip = ?1",
                table.table_name()
            ),
            params![ip],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// True when a row with this IP *or* this device name exists in the given table. Used by
    /// the skip-named-duplicates policy, where matching either half of the (ip, name) pair
    /// counts as already-seen.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn ip_or_name_exists(
        &self,
        ip: &str,
        device_name: &str,
        table: CrawlTable,
    ) -> Result<bool, CrawlError> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE ip = ?1 OR device_name = ?2",
                table.table_name()
            ),
            params![ip, device_name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Count of pending rows (claimed and unclaimed alike).
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn count_pending(&self) -> Result<i64, CrawlError> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending", [], |row| row.get(0))?;

        Ok(count)
    }

    /// Enqueue every neighbor of a processed device that advertised a usable platform and a
    /// management IP. Duplicates fall into the idempotent-insert path.
    ///
    /// # Errors
    ///
    /// Database errors other than duplicates.
    pub fn add_device_neighbors(
        &self,
        device: &Device,
    ) -> Result<usize, CrawlError> {
        let mut added = 0;

        for neighbor in device.all_neighbors() {
            if !neighbor.platform.is_known() {
                debug!(
                    "skipping neighbor '{}' of {}: platform unknown",
                    neighbor.device_name, device.ip
                );

                continue;
            }

            let Some(ip) = neighbor.management_ip() else {
                continue;
            };

            let record = PendingRecord {
                pending_id: 0,
                ip: ip.to_owned(),
                working: false,
                device_name: Some(neighbor.device_name.clone()),
                platform: neighbor.platform,
                system_platform: neighbor.system_platform.clone(),
                source_interface: neighbor.source_interface.clone(),
                neighbor_interface: neighbor.neighbor_interface.clone(),
                software: neighbor.software.clone(),
                raw_cdp: neighbor.raw_advertisement.clone(),
            };

            self.add_pending(&record)?;

            added += 1;
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_pending_twice_leaves_one_row() {
        let store = CrawlStore::in_memory().unwrap();

        let record = PendingRecord::seed("10.0.0.1", Platform::CiscoIos);

        store.add_pending(&record).unwrap();
        store.add_pending(&record).unwrap();

        assert_eq!(store.count_pending().unwrap(), 1);
        assert!(store.ip_exists("10.0.0.1", CrawlTable::Pending).unwrap());
    }

    #[test]
    fn get_next_claims_lowest_id_once() {
        let store = CrawlStore::in_memory().unwrap();

        store
            .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
            .unwrap();
        store
            .add_pending(&PendingRecord::seed("10.0.0.2", Platform::CiscoIos))
            .unwrap();

        let first = store.get_next().unwrap().unwrap();
        assert_eq!(first.ip, "10.0.0.1");
        assert!(first.working);

        let second = store.get_next().unwrap().unwrap();
        assert_eq!(second.ip, "10.0.0.2");

        // everything claimed now
        assert!(store.get_next().unwrap().is_none());
    }

    #[test]
    fn startup_releases_claims_and_optionally_clears_visited() {
        let store = CrawlStore::in_memory().unwrap();

        store
            .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
            .unwrap();
        let _ = store.get_next().unwrap().unwrap();

        store
            .add_visited(&VisitedRecord {
                visited_id: 0,
                ip: String::from("10.0.0.9"),
                device_name: None,
            })
            .unwrap();

        store.startup(true).unwrap();

        // the claim is back in the pool and visited is empty
        assert!(store.get_next().unwrap().is_some());
        assert!(!store.ip_exists("10.0.0.9", CrawlTable::Visited).unwrap());
    }

    #[test]
    fn visited_round_trip() {
        let store = CrawlStore::in_memory().unwrap();

        let record = VisitedRecord {
            visited_id: 0,
            ip: String::from("10.0.0.5"),
            device_name: Some(String::from("sw5")),
        };

        store.add_visited(&record).unwrap();
        store.add_visited(&record).unwrap();

        assert!(store.ip_exists("10.0.0.5", CrawlTable::Visited).unwrap());

        store.remove_visited("10.0.0.5").unwrap();

        assert!(!store.ip_exists("10.0.0.5", CrawlTable::Visited).unwrap());
    }

    #[test]
    fn name_pair_existence() {
        let store = CrawlStore::in_memory().unwrap();

        let mut record = PendingRecord::seed("10.0.0.1", Platform::CiscoIos);
        record.device_name = Some(String::from("core-sw01"));

        store.add_pending(&record).unwrap();

        assert!(store
            .ip_or_name_exists("10.9.9.9", "core-sw01", CrawlTable::Pending)
            .unwrap());
        assert!(!store
            .ip_or_name_exists("10.9.9.9", "other", CrawlTable::Pending)
            .unwrap());
    }

    #[test]
    fn pending_record_fields_survive_the_queue() {
        let store = CrawlStore::in_memory().unwrap();

        let record = PendingRecord {
            pending_id: 0,
            ip: String::from("10.0.0.7"),
            working: false,
            device_name: Some(String::from("edge-rtr")),
            platform: Platform::CiscoNxos,
            system_platform: Some(String::from("N9K-C9396PX")),
            source_interface: Some(String::from("GigabitEthernet1/0/2")),
            neighbor_interface: Some(String::from("Ethernet1/47")),
            software: Some(String::from("NX-OS 7.0(3)I7(6)")),
            raw_cdp: Some(String::from("Device ID: edge-rtr\n...")),
        };

        store.add_pending(&record).unwrap();

        let claimed = store.get_next().unwrap().unwrap();

        assert_eq!(claimed.ip, record.ip);
        assert_eq!(claimed.device_name, record.device_name);
        assert_eq!(claimed.platform, Platform::CiscoNxos);
        assert_eq!(claimed.system_platform, record.system_platform);
        assert_eq!(claimed.source_interface, record.source_interface);
        assert_eq!(claimed.neighbor_interface, record.neighbor_interface);
        assert_eq!(claimed.software, record.software);
        assert_eq!(claimed.raw_cdp, record.raw_cdp);
    }

    #[test]
    fn concurrent_claims_never_hand_out_the_same_row() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let store = Arc::new(CrawlStore::in_memory().unwrap());

        for octet in 1..=20_u8 {
            store
                .add_pending(&PendingRecord::seed(
                    &format!("10.0.0.{octet}"),
                    Platform::CiscoIos,
                ))
                .unwrap();
        }

        let mut handles = vec![];

        for _ in 0..4 {
            let store = Arc::clone(&store);

            handles.push(std::thread::spawn(move || {
                let mut claimed = vec![];

                while let Some(record) = store.get_next().unwrap() {
                    claimed.push(record.ip);
                }

                claimed
            }));
        }

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(all.len(), 20);

        let unique: HashSet<String> = all.drain(..).collect();
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn neighbors_enqueue_with_known_platform_only() {
        use crate::device::model::{
            Device,
            Neighbor,
        };

        let store = CrawlStore::in_memory().unwrap();

        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);

        let mut known = Neighbor::default();
        known.device_name = String::from("peer1");
        known.platform = Platform::CiscoIos;
        known.ips = vec![String::from("10.0.0.2")];

        let mut unknown = Neighbor::default();
        unknown.device_name = String::from("mystery");
        unknown.platform = Platform::Unknown;
        unknown.ips = vec![String::from("10.0.0.3")];

        device.neighbors.push(known);
        device.neighbors.push(unknown);

        store.add_device_neighbors(&device).unwrap();

        assert!(store.ip_exists("10.0.0.2", CrawlTable::Pending).unwrap());
        assert!(!store.ip_exists("10.0.0.3", CrawlTable::Pending).unwrap());
    }
}
