//! # Probe Geo
//!
//! Offline GeoLite2 lookups mapping a client IP to `{asn, country,
//! continent, region}`. The country database is mandatory; the ASN
//! database is optional and its absence only zeroes the ASN field.

use maxminddb::{geoip2, Reader};
use probe_core::Region;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Result type alias for geo operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Geo database errors
#[derive(Error, Debug)]
pub enum GeoError {
    /// The mandatory country database could not be opened
    #[error("failed to open country database: {0}")]
    CountryDb(#[source] maxminddb::MaxMindDBError),

    /// The optional ASN database was configured but could not be opened
    #[error("failed to open ASN database: {0}")]
    AsnDb(#[source] maxminddb::MaxMindDBError),
}

/// Resolved client geography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoInfo {
    pub asn: i64,
    /// ISO-2 country code, empty when unknown
    pub cc: String,
    /// Continent code (EU, AS, NA, OC, AF, SA, AN), empty when unknown
    pub continent: String,
    pub region: Region,
}

impl GeoInfo {
    /// Fallback used for missing or unresolvable addresses.
    pub fn unknown() -> Self {
        Self {
            asn: 0,
            cc: String::new(),
            continent: String::new(),
            region: Region::Eu,
        }
    }
}

/// Handle over the offline GeoLite2 databases.
#[derive(Debug)]
pub struct GeoDb {
    country: Reader<Vec<u8>>,
    asn: Option<Reader<Vec<u8>>>,
}

impl GeoDb {
    /// Open the country database and, when a path is given, the ASN
    /// database. A missing country database fails initialization.
    pub fn open(country_path: impl AsRef<Path>, asn_path: Option<&Path>) -> Result<Self> {
        let country = Reader::open_readfile(country_path).map_err(GeoError::CountryDb)?;

        let asn = match asn_path {
            Some(path) => Some(Reader::open_readfile(path).map_err(GeoError::AsnDb)?),
            None => None,
        };

        Ok(Self { country, asn })
    }

    /// Resolve an IP to its geography. Unknown addresses and lookup
    /// failures degrade to the EU-region fallback rather than erroring.
    pub fn lookup(&self, ip: Option<IpAddr>) -> GeoInfo {
        let Some(ip) = ip else {
            return GeoInfo::unknown();
        };

        let mut info = GeoInfo::unknown();

        if let Some(asn_db) = &self.asn {
            match asn_db.lookup::<geoip2::Asn>(ip) {
                Ok(record) => {
                    info.asn = record.autonomous_system_number.unwrap_or(0) as i64;
                }
                Err(err) => debug!(%ip, error = %err, "ASN lookup missed"),
            }
        }

        match self.country.lookup::<geoip2::Country>(ip) {
            Ok(record) => {
                if let Some(country) = record.country {
                    info.cc = country.iso_code.unwrap_or_default().to_string();
                }
                if let Some(continent) = record.continent {
                    info.continent = continent.code.unwrap_or_default().to_string();
                }
            }
            Err(err) => debug!(%ip, error = %err, "country lookup missed"),
        }

        info.region = Region::from_continent(&info.continent);
        info
    }
}
