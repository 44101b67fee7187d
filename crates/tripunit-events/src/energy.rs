//! Energy log cursor.
//!
//! Energy entries live in the bulk store, two 128-byte entries to a 256-byte
//! page. The cursor counts half-pages from the start of the first energy sector
//! and the number of entries held.
//!
//! The first half of each page is parked in a persistent holding register; the
//! second half triggers one bulk write of the whole page. When the cursor
//! crosses into a new sector that sector is erased first, so the oldest
//! sector's worth of entries is given up.

use tripunit_nvram::Complemented;

use crate::config::EngineConfig;

/// Persisted position of the energy log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyCursor {
    /// Half-page the next entry goes to.
    pub next_half_page: u32,
    /// Entries held.
    pub entries: u32,
}

impl Complemented for EnergyCursor {
    fn to_word(self) -> u32 {
        let half_page = u16::try_from(self.next_half_page).unwrap_or(u16::MAX);
        let entries = u16::try_from(self.entries).unwrap_or(u16::MAX);
        u32::from(half_page) | (u32::from(entries) << 16)
    }

    fn from_word(word: u32) -> Self {
        Self {
            next_half_page: word & 0xFFFF,
            entries: word >> 16,
        }
    }
}

/// Half-page arithmetic for one energy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyGeometry {
    first_sector: u32,
    end_sector: u32,
    per_sector: u32,
    entry_cap: u32,
}

impl EnergyGeometry {
    /// Geometry for a validated configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            first_sector: config.energy_first_sector,
            end_sector: config.energy_end_sector,
            per_sector: config.energy_half_pages_per_sector.max(1),
            entry_cap: config.energy_entry_cap(),
        }
    }

    /// Cursor of an empty log.
    #[must_use]
    pub fn empty(&self) -> EnergyCursor {
        EnergyCursor {
            next_half_page: self.first_sector.saturating_mul(self.per_sector),
            entries: 0,
        }
    }

    /// Whether `cursor` addresses a half-page inside the region.
    #[must_use]
    pub fn contains(&self, cursor: EnergyCursor) -> bool {
        let sector = cursor.next_half_page / self.per_sector;
        sector >= self.first_sector && sector < self.end_sector
    }

    /// Whether `cursor` could have been produced by this geometry: inside the
    /// region and counting no more entries than the region holds.
    #[must_use]
    pub fn is_plausible(&self, cursor: EnergyCursor) -> bool {
        let region = self
            .end_sector
            .saturating_sub(self.first_sector)
            .saturating_mul(self.per_sector);
        self.contains(cursor) && cursor.entries <= region
    }

    /// Sector holding `half_page`.
    #[must_use]
    pub fn sector_of(&self, half_page: u32) -> u32 {
        half_page / self.per_sector
    }

    /// Whether the next entry is the first half of a page.
    #[must_use]
    pub fn is_first_half(&self, cursor: EnergyCursor) -> bool {
        cursor.next_half_page % 2 == 0
    }

    /// Cursor after one entry is parked in the holding register.
    #[must_use]
    pub fn parked(&self, cursor: EnergyCursor) -> EnergyCursor {
        EnergyCursor {
            next_half_page: cursor.next_half_page.saturating_add(1),
            entries: cursor.entries.saturating_add(1),
        }
    }

    /// Cursor after a page write is acknowledged, and the sector to erase if the
    /// cursor moved into a new one.
    #[must_use]
    pub fn written(&self, cursor: EnergyCursor) -> (EnergyCursor, Option<u32>) {
        let mut next = cursor.next_half_page.saturating_add(1);
        if self.sector_of(next) >= self.end_sector {
            next = self.first_sector.saturating_mul(self.per_sector);
        }
        let mut entries = cursor.entries.saturating_add(1);
        let erase = (next % self.per_sector == 0).then(|| {
            entries = entries.min(self.entry_cap);
            self.sector_of(next)
        });
        (
            EnergyCursor {
                next_half_page: next,
                entries,
            },
            erase,
        )
    }
}
