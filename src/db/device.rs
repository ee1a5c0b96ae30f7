//! Device registry: pot identities and species profiles

use chrono::{DateTime, Utc};

use super::DbPool;
use crate::{Error, Result};

/// Species assigned to a pot that never declared one
pub const DEFAULT_SPECIES: &str = "Basil";

/// A registered pot
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub species: String,
    pub created_at: DateTime<Utc>,
}

/// Stored knowledge about a species
#[derive(Debug, Clone)]
pub struct SpeciesProfile {
    pub species: String,
    pub biological_info: String,
    pub care_tips: String,
    pub lore: String,
}

impl SpeciesProfile {
    /// Compact single-string form handed to the knowledge stage
    #[must_use]
    pub fn summarize(&self) -> String {
        format!(
            "{} Care: {} Lore: {}",
            self.biological_info, self.care_tips, self.lore
        )
    }
}

/// Device registry repository
#[derive(Clone)]
pub struct DeviceRepo {
    pool: DbPool,
}

impl DeviceRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch a device, auto-registering unknown ids
    ///
    /// First contact from a pot registers it with a generated name and the
    /// default species; species can be corrected out of band later.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn ensure(&self, device_id: &str) -> Result<Device> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let existing: Option<Device> = conn
            .query_row(
                "SELECT id, name, species, created_at FROM devices WHERE id = ?1",
                [device_id],
                |row| {
                    Ok(Device {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        species: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .ok();

        if let Some(device) = existing {
            return Ok(device);
        }

        let now = Utc::now();
        let name = format!("Pot {device_id}");
        conn.execute(
            "INSERT INTO devices (id, name, species, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![device_id, &name, DEFAULT_SPECIES, now.to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(device = device_id, "registered new pot");
        Ok(Device {
            id: device_id.to_string(),
            name,
            species: DEFAULT_SPECIES.to_string(),
            created_at: now,
        })
    }

    /// Look up the stored profile for a species, if any
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn species_profile(&self, species: &str) -> Result<Option<SpeciesProfile>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let profile = conn
            .query_row(
                "SELECT species, biological_info, care_tips, lore
                 FROM species_profiles WHERE species = ?1",
                [species],
                |row| {
                    Ok(SpeciesProfile {
                        species: row.get(0)?,
                        biological_info: row.get(1)?,
                        care_tips: row.get(2)?,
                        lore: row.get(3)?,
                    })
                },
            )
            .ok();

        Ok(profile)
    }

    /// Seed the bundled species profiles, skipping any already present
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn seed_species(&self) -> Result<usize> {
        const BUNDLED: [(&str, &str, &str, &str); 3] = [
            (
                "Basil",
                "Ocimum basilicum is a culinary herb of the family Lamiaceae (mints).",
                "Requires at least 6 hours of sun, well-draining soil, and consistent moisture.",
                "Historically associated with love and prosperity in many Mediterranean cultures.",
            ),
            (
                "Cactus",
                "Cactaceae store water in thickened stems and are native to the Americas.",
                "Full sun, gritty soil, and water only when the soil has dried out completely.",
                "Desert peoples prized cacti as living wells and boundary markers.",
            ),
            (
                "Monstera",
                "Monstera deliciosa is a climbing aroid whose leaves fenestrate with age.",
                "Bright indirect light, chunky soil, and watering when the top inch dries.",
                "The split leaves were once believed to let storms pass through unharmed.",
            ),
        ];

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut inserted = 0;
        for (species, bio, care, lore) in BUNDLED {
            inserted += conn
                .execute(
                    "INSERT OR IGNORE INTO species_profiles
                     (species, biological_info, care_tips, lore)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![species, bio, care, lore],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
        }

        Ok(inserted)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> DeviceRepo {
        DeviceRepo::new(init_memory().unwrap())
    }

    #[test]
    fn ensure_registers_unknown_device_with_default_species() {
        let repo = setup();
        let device = repo.ensure("pot-1").unwrap();
        assert_eq!(device.species, DEFAULT_SPECIES);
        assert_eq!(device.name, "Pot pot-1");

        // Second contact returns the same registration
        let again = repo.ensure("pot-1").unwrap();
        assert_eq!(again.id, device.id);
        assert_eq!(again.species, device.species);
    }

    #[test]
    fn species_profile_roundtrip_and_seed_idempotence() {
        let repo = setup();
        assert!(repo.species_profile("Basil").unwrap().is_none());

        assert_eq!(repo.seed_species().unwrap(), 3);
        assert_eq!(repo.seed_species().unwrap(), 0);

        let basil = repo.species_profile("Basil").unwrap().unwrap();
        assert!(basil.biological_info.contains("Ocimum basilicum"));
        assert!(basil.summarize().contains("Care:"));

        assert!(repo.species_profile("Orchid").unwrap().is_none());
    }
}
