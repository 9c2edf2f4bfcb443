use crate::device::model::{
    Device,
    Interface,
    MacEntry,
    Neighbor,
    Serial,
};
use crate::device::platform::Platform;
use crate::errors::CrawlError;
use crate::parse::mac::normalize_mac;
use ipnet::Ipv4Net;
use rusqlite::{
    params,
    Connection,
    OptionalExtension,
    Transaction,
};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{
    Arc,
    Mutex,
};

/// Where a located MAC was found: device, interface, and -- when the interface also heard a
/// neighbor advertisement -- who is on the far end.
#[derive(Clone, Debug)]
pub struct MacLocation {
    /// Name of the device holding the forwarding entry.
    pub device_name: String,
    /// Interface the MAC was learned on.
    pub interface_name: String,
    /// Neighbor advertised on that interface, if any.
    pub neighbor_name: Option<String>,
}

/// The inventory database: devices and their child rows, written one device per transaction.
/// The single connection behind a mutex is the single-writer boundary the schema expects.
pub struct InventoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryStore {
    /// Open (creating as needed) the inventory database at `path`.
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

        store.initialize()?;

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

        store.initialize()?;

        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CrawlError> {
        self.conn
            .lock()
            .map_err(|_| CrawlError::Fatal(String::from("inventory store lock poisoned")))
    }

    fn initialize(&self) -> Result<(), CrawlError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS devices (
                device_id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                device_name TEXT,
                unique_name TEXT,
                platform TEXT NOT NULL DEFAULT 'unknown',
                system_platform TEXT,
                software TEXT,
                raw_config TEXT,
                raw_neighbors TEXT,
                ssh_reachable INTEGER NOT NULL DEFAULT 0,
                telnet_reachable INTEGER NOT NULL DEFAULT 0,
                cred_username TEXT,
                cred_password TEXT,
                cred_type TEXT,
                failed INTEGER NOT NULL DEFAULT 0,
                error_log TEXT,
                updated TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS serials (
                serial_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                name TEXT,
                description TEXT,
                product_id TEXT,
                vendor_id TEXT,
                serial_number TEXT NOT NULL,
                FOREIGN KEY (device_id) REFERENCES devices(device_id)
                    ON DELETE CASCADE ON UPDATE CASCADE
            );

            CREATE TABLE IF NOT EXISTS interfaces (
                interface_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                type_prefix TEXT,
                number TEXT,
                ip TEXT,
                netmask TEXT,
                cidr INTEGER,
                description TEXT,
                virtual_ip TEXT,
                raw_config TEXT,
                network_ip TEXT,
                FOREIGN KEY (device_id) REFERENCES devices(device_id)
                    ON DELETE CASCADE ON UPDATE CASCADE
            );

            CREATE TABLE IF NOT EXISTS mac (
                mac_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                interface_id INTEGER NOT NULL,
                mac TEXT NOT NULL,
                interface_name TEXT NOT NULL,
                FOREIGN KEY (device_id) REFERENCES devices(device_id)
                    ON DELETE CASCADE ON UPDATE CASCADE,
                FOREIGN KEY (interface_id) REFERENCES interfaces(interface_id)
                    ON DELETE CASCADE ON UPDATE CASCADE
            );

            CREATE TABLE IF NOT EXISTS neighbors (
                neighbor_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                interface_id INTEGER,
                device_name TEXT,
                platform TEXT NOT NULL DEFAULT 'unknown',
                system_platform TEXT,
                source_interface TEXT,
                neighbor_interface TEXT,
                software TEXT,
                raw_cdp TEXT,
                FOREIGN KEY (device_id) REFERENCES devices(device_id)
                    ON DELETE CASCADE ON UPDATE CASCADE,
                FOREIGN KEY (interface_id) REFERENCES interfaces(interface_id)
                    ON DELETE CASCADE ON UPDATE CASCADE
            );

            CREATE TABLE IF NOT EXISTS neighbor_ips (
                neighbor_ip_id INTEGER PRIMARY KEY AUTOINCREMENT,
                neighbor_id INTEGER NOT NULL,
                ip TEXT NOT NULL,
                FOREIGN KEY (neighbor_id) REFERENCES neighbors(neighbor_id)
                    ON DELETE CASCADE ON UPDATE CASCADE
            );
            ",
        )?;

        Ok(())
    }

    fn insert_neighbor(
        tx: &Transaction<'_>,
        device_id: i64,
        interface_id: Option<i64>,
        neighbor: &Neighbor,
    ) -> Result<(), CrawlError> {
        tx.execute(
            "INSERT INTO neighbors (device_id, interface_id, device_name, platform,
                                    system_platform, source_interface, neighbor_interface,
                                    software, raw_cdp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                device_id,
                interface_id,
                neighbor.device_name,
                neighbor.platform.as_str(),
                neighbor.system_platform,
                neighbor.source_interface,
                neighbor.neighbor_interface,
                neighbor.software,
                neighbor.raw_advertisement,
            ],
        )?;

        let neighbor_id = tx.last_insert_rowid();

        for ip in &neighbor.ips {
            tx.execute(
                "INSERT INTO neighbor_ips (neighbor_id, ip) VALUES (?1, ?2)",
                params![neighbor_id, ip],
            )?;
        }

        Ok(())
    }

    /// Persist a device and its whole subtree -- serials, interfaces, per-interface MACs and
    /// neighbors, device-level neighbors, neighbor IPs -- in one transaction. Returns the new
    /// device id.
    ///
    /// # Errors
    ///
    /// Database errors; on any error the transaction rolls back and nothing of the device is
    /// stored.
    pub fn add_device(
        &self,
        device: &Device,
    ) -> Result<i64, CrawlError> {
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;

        let credential = device.credential.clone().unwrap_or_default();

        tx.execute(
            "INSERT INTO devices (ip, device_name, unique_name, platform, system_platform,
                                  software, raw_config, raw_neighbors, ssh_reachable,
                                  telnet_reachable, cred_username, cred_password, cred_type,
                                  failed, error_log)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                device.ip,
                device.device_name,
                device.unique_name(),
                device.platform.as_str(),
                device.system_platform,
                device.software,
                device.raw_config,
                device.raw_neighbors,
                i32::from(device.ssh_reachable),
                i32::from(device.telnet_reachable),
                credential.username,
                credential.password_redacted,
                credential.cred_type,
                i32::from(device.failed),
                device.error_log.join("\n"),
            ],
        )?;

        let device_id = tx.last_insert_rowid();

        for serial in &device.serials {
            tx.execute(
                "INSERT INTO serials (device_id, name, description, product_id, vendor_id,
                                      serial_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    device_id,
                    serial.name,
                    serial.description,
                    serial.product_id,
                    serial.vendor_id,
                    serial.serial_number,
                ],
            )?;
        }

        for interface in &device.interfaces {
            tx.execute(
                "INSERT INTO interfaces (device_id, name, type_prefix, number, ip, netmask,
                                         cidr, description, virtual_ip, raw_config, network_ip)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    device_id,
                    interface.name,
                    interface.type_prefix,
                    interface.number,
                    interface.ip,
                    interface.netmask,
                    interface.cidr,
                    interface.description,
                    interface.virtual_ip,
                    interface.raw_config,
                    interface.network_ip,
                ],
            )?;

            let interface_id = tx.last_insert_rowid();

            for entry in &interface.macs {
                tx.execute(
                    "INSERT INTO mac (device_id, interface_id, mac, interface_name)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![device_id, interface_id, entry.mac, interface.name],
                )?;
            }

            for neighbor in &interface.neighbors {
                Self::insert_neighbor(&tx, device_id, Some(interface_id), neighbor)?;
            }
        }

        for neighbor in &device.neighbors {
            Self::insert_neighbor(&tx, device_id, None, neighbor)?;
        }

        tx.commit()?;

        Ok(device_id)
    }

    /// True when a device with this unique name already exists.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn unique_name_exists(
        &self,
        unique_name: &str,
    ) -> Result<bool, CrawlError> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM devices WHERE unique_name = ?1",
            params![unique_name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// True when any persisted device has this management IP.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn ip_exists(
        &self,
        ip: &str,
    ) -> Result<bool, CrawlError> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM devices WHERE ip = ?1",
            params![ip],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Count of persisted devices.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn device_count(&self) -> Result<i64, CrawlError> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;

        Ok(count)
    }

    /// Find every (device, interface, neighbor?) location where a MAC appears. The input is
    /// normalized first, so any separator flavor locates the canonical stored form.
    ///
    /// # Errors
    ///
    /// Database errors; `Config` when the input is not MAC-shaped.
    pub fn locate_mac(
        &self,
        raw_mac: &str,
    ) -> Result<Vec<MacLocation>, CrawlError> {
        let mac = normalize_mac(raw_mac)
            .ok_or_else(|| CrawlError::Config(format!("'{raw_mac}' is not a mac address")))?;

        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT d.device_name, m.interface_name, m.interface_id
             FROM mac m
             JOIN devices d ON d.device_id = m.device_id
             WHERE m.mac = ?1
             ORDER BY m.mac_id",
        )?;

        let rows: Vec<(String, String, i64)> = stmt
            .query_map(params![mac], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<_, _>>()?;

        drop(stmt);

        let mut result = vec![];

        for (device_name, interface_name, interface_id) in rows {
            let neighbor_name: Option<String> = conn
                .query_row(
                    "SELECT device_name FROM neighbors
                     WHERE interface_id = ?1 ORDER BY neighbor_id LIMIT 1",
                    params![interface_id],
                    |row| row.get(0),
                )
                .optional()?;

            result.push(MacLocation {
                device_name,
                interface_name,
                neighbor_name,
            });
        }

        Ok(result)
    }

    /// Device ids of every device owning an interface addressed inside `net`.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn devices_on_subnet(
        &self,
        net: Ipv4Net,
    ) -> Result<Vec<i64>, CrawlError> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT DISTINCT device_id, ip FROM interfaces WHERE ip IS NOT NULL")?;

        let rows: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let mut result: Vec<i64> = vec![];

        for (device_id, ip) in rows {
            let Ok(addr) = ip.parse::<Ipv4Addr>() else {
                continue;
            };

            if net.contains(&addr) && !result.contains(&device_id) {
                result.push(device_id);
            }
        }

        Ok(result)
    }

    /// Stream every MAC learned on an interface addressed inside `net` to `visit`, one row at a
    /// time -- rows are never materialized into one collection.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn macs_on_subnet<F>(
        &self,
        net: Ipv4Net,
        mut visit: F,
    ) -> Result<(), CrawlError>
    where
        F: FnMut(&str),
    {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT m.mac, i.ip
             FROM mac m
             JOIN interfaces i ON i.interface_id = m.interface_id
             WHERE i.ip IS NOT NULL
             ORDER BY m.mac_id",
        )?;

        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let mac: String = row.get(0)?;
            let ip: String = row.get(1)?;

            let Ok(addr) = ip.parse::<Ipv4Addr>() else {
                continue;
            };

            if net.contains(&addr) {
                visit(&mac);
            }
        }

        Ok(())
    }

    /// Reload a persisted device subtree by id. The inverse of [`Self::add_device`], used by
    /// support tooling and the persistence round-trip tests.
    ///
    /// # Errors
    ///
    /// Database errors; `Config` when no such device exists.
    pub fn get_device(
        &self,
        device_id: i64,
    ) -> Result<Device, CrawlError> {
        let conn = self.lock()?;

        let mut device = conn
            .query_row(
                "SELECT ip, device_name, platform, system_platform, software, raw_config,
                        raw_neighbors, ssh_reachable, telnet_reachable, failed, error_log
                 FROM devices WHERE device_id = ?1",
                params![device_id],
                |row| {
                    let mut device = Device::new(
                        &row.get::<_, String>(0)?,
                        Platform::parse(&row.get::<_, String>(2)?),
                    );

                    device.device_name = row.get::<_, Option<String>>(1)?.unwrap_or_default();
                    device.system_platform = row.get(3)?;
                    device.software = row.get(4)?;
                    device.raw_config = row.get::<_, Option<String>>(5)?.unwrap_or_default();
                    device.raw_neighbors = row.get::<_, Option<String>>(6)?.unwrap_or_default();
                    device.ssh_reachable = row.get::<_, i64>(7)? != 0;
                    device.telnet_reachable = row.get::<_, i64>(8)? != 0;
                    device.failed = row.get::<_, i64>(9)? != 0;

                    let error_log: Option<String> = row.get(10)?;
                    device.error_log = error_log
                        .filter(|log| !log.is_empty())
                        .map(|log| log.lines().map(str::to_owned).collect())
                        .unwrap_or_default();

                    Ok(device)
                },
            )
            .optional()?
            .ok_or_else(|| CrawlError::Config(format!("no device with id {device_id}")))?;

        let mut stmt = conn.prepare(
            "SELECT name, description, product_id, vendor_id, serial_number
             FROM serials WHERE device_id = ?1 ORDER BY serial_id",
        )?;

        device.serials = stmt
            .query_map(params![device_id], |row| {
                Ok(Serial {
                    name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    product_id: row.get(2)?,
                    vendor_id: row.get(3)?,
                    serial_number: row.get(4)?,
                })
            })?
            .collect::<Result<_, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT interface_id, name, type_prefix, number, ip, netmask, cidr, description,
                    virtual_ip, raw_config, network_ip
             FROM interfaces WHERE device_id = ?1 ORDER BY interface_id",
        )?;

        let interfaces: Vec<(i64, Interface)> = stmt
            .query_map(params![device_id], |row| {
                let interface = Interface {
                    name: row.get(1)?,
                    type_prefix: row.get(2)?,
                    number: row.get(3)?,
                    ip: row.get(4)?,
                    netmask: row.get(5)?,
                    cidr: row.get(6)?,
                    description: row.get(7)?,
                    virtual_ip: row.get(8)?,
                    raw_config: row.get(9)?,
                    network_ip: row.get(10)?,
                    macs: vec![],
                    neighbors: vec![],
                };

                Ok((row.get(0)?, interface))
            })?
            .collect::<Result<_, _>>()?;

        let mut mac_stmt = conn.prepare(
            "SELECT mac FROM mac WHERE interface_id = ?1 ORDER BY mac_id",
        )?;

        let mut neighbor_stmt = conn.prepare(
            "SELECT neighbor_id, device_name, platform, system_platform, source_interface,
                    neighbor_interface, software, raw_cdp
             FROM neighbors WHERE device_id = ?1 AND interface_id IS ?2 ORDER BY neighbor_id",
        )?;

        let mut ip_stmt =
            conn.prepare("SELECT ip FROM neighbor_ips WHERE neighbor_id = ?1 ORDER BY neighbor_ip_id")?;

        let mut load_neighbors =
            |interface_id: Option<i64>| -> Result<Vec<Neighbor>, rusqlite::Error> {
                let rows: Vec<(i64, Neighbor)> = neighbor_stmt
                    .query_map(params![device_id, interface_id], |row| {
                        let neighbor = Neighbor {
                            device_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                            ips: vec![],
                            platform: Platform::parse(&row.get::<_, String>(2)?),
                            system_platform: row.get(3)?,
                            source_interface: row.get(4)?,
                            neighbor_interface: row.get(5)?,
                            software: row.get(6)?,
                            raw_advertisement: row.get(7)?,
                        };

                        Ok((row.get(0)?, neighbor))
                    })?
                    .collect::<Result<_, _>>()?;

                let mut result = vec![];

                for (neighbor_id, mut neighbor) in rows {
                    neighbor.ips = ip_stmt
                        .query_map(params![neighbor_id], |row| row.get(0))?
                        .collect::<Result<_, _>>()?;

                    result.push(neighbor);
                }

                Ok(result)
            };

        for (interface_id, mut interface) in interfaces {
            interface.macs = mac_stmt
                .query_map(params![interface_id], |row| {
                    Ok(MacEntry {
                        mac: row.get(0)?,
                        interface: interface.name.clone(),
                    })
                })?
                .collect::<Result<_, _>>()?;

            interface.neighbors = load_neighbors(Some(interface_id))?;

            device.interfaces.push(interface);
        }

        device.neighbors = load_neighbors(None)?;

        Ok(device)
    }
}
