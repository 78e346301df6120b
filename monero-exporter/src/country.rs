//! Mapping of peer addresses to the country they are located in.

use std::{fmt, net::IpAddr, path::Path};

use maxminddb::{MaxMindDBError, Reader, geoip2};

/// Label value used whenever a country can't be determined
pub const UNKNOWN_COUNTRY: &str = "unknown";

#[derive(Debug, thiserror::Error)]
#[error("country lookup for {ip} failed: {reason}")]
pub struct CountryError {
    pub ip: IpAddr,
    pub reason: String,
}

/// Resolves an IP address to a country name
pub trait CountryMapper: Send + Sync + std::fmt::Debug {
    fn country(&self, ip: IpAddr) -> Result<String, CountryError>;
}

/// A [`CountryMapper`] that places every address in [`UNKNOWN_COUNTRY`]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownCountry;

impl CountryMapper for UnknownCountry {
    fn country(&self, _ip: IpAddr) -> Result<String, CountryError> {
        Ok(UNKNOWN_COUNTRY.to_owned())
    }
}

/// A [`CountryMapper`] backed by a MaxMind GeoIP2 (or GeoLite2) country database
///
/// Addresses resolve to the ISO code of the country they are registered in. Addresses missing
/// from the database, or recorded without a country, are [`UNKNOWN_COUNTRY`].
pub struct GeoIpCountry {
    reader: Reader<Vec<u8>>,
}

impl GeoIpCountry {
    /// Load the database at `path` into memory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MaxMindDBError> {
        Ok(Self { reader: Reader::open_readfile(path)? })
    }

    pub fn from_bytes(database: Vec<u8>) -> Result<Self, MaxMindDBError> {
        Ok(Self { reader: Reader::from_source(database)? })
    }
}

impl fmt::Debug for GeoIpCountry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoIpCountry")
            .field("database_type", &self.reader.metadata.database_type)
            .field("build_epoch", &self.reader.metadata.build_epoch)
            .finish()
    }
}

impl CountryMapper for GeoIpCountry {
    fn country(&self, ip: IpAddr) -> Result<String, CountryError> {
        match self.reader.lookup::<geoip2::Country<'_>>(ip) {
            Ok(record) => Ok(record
                .registered_country
                .and_then(|country| country.iso_code)
                .unwrap_or(UNKNOWN_COUNTRY)
                .to_owned()),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(UNKNOWN_COUNTRY.to_owned()),
            Err(err) => Err(CountryError { ip, reason: err.to_string() }),
        }
    }
}

/// Country of `host`, or [`UNKNOWN_COUNTRY`] when it isn't an IP address
pub fn country_of(mapper: &dyn CountryMapper, host: &str) -> Result<String, CountryError> {
    match host.parse::<IpAddr>() {
        Ok(ip) => mapper.country(ip),
        Err(_) => Ok(UNKNOWN_COUNTRY.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Failing;

    impl CountryMapper for Failing {
        fn country(&self, ip: IpAddr) -> Result<String, CountryError> {
            Err(CountryError { ip, reason: "database closed".into() })
        }
    }

    #[test]
    fn hostnames_are_unknown() {
        assert_eq!(country_of(&Failing, "node.example.org").unwrap(), UNKNOWN_COUNTRY);
        assert_eq!(country_of(&UnknownCountry, "10.0.0.1").unwrap(), UNKNOWN_COUNTRY);
    }

    /// MaxMind DB encoding of a string
    fn string(value: &str) -> Vec<u8> {
        assert!(value.len() < 29);
        let mut out = vec![0x40 | value.len() as u8];
        out.extend_from_slice(value.as_bytes());
        out
    }

    /// A one-entry map, `{key: value}`, where `value` is already encoded
    fn map1(key: &str, value: Vec<u8>) -> Vec<u8> {
        let mut out = vec![0xe1];
        out.extend(string(key));
        out.extend(value);
        out
    }

    /// An IPv4 database with a single search node: addresses below 128.0.0.0 are registered in
    /// `low`, the upper half of the space is absent.
    fn database(low: &str) -> Vec<u8> {
        const NODE_COUNT: u32 = 1;
        let record = map1("registered_country", map1("iso_code", string(low)));

        let mut db = Vec::new();
        // one node, two 24-bit records: data pointer on the left, "not found" on the right
        let data_pointer = NODE_COUNT + 16;
        db.extend_from_slice(&data_pointer.to_be_bytes()[1..]);
        db.extend_from_slice(&NODE_COUNT.to_be_bytes()[1..]);
        db.extend_from_slice(&[0; 16]);
        db.extend(record);

        db.extend_from_slice(b"\xab\xcd\xefMaxMind.com");
        db.push(0xe9);
        db.extend(string("binary_format_major_version"));
        db.extend_from_slice(&[0xa1, 2]);
        db.extend(string("binary_format_minor_version"));
        db.push(0xa0);
        db.extend(string("build_epoch"));
        db.extend_from_slice(&[0x00, 0x02]);
        db.extend(string("database_type"));
        db.extend(string("GeoIP2-Country"));
        db.extend(string("description"));
        db.push(0xe0);
        db.extend(string("ip_version"));
        db.extend_from_slice(&[0xa1, 4]);
        db.extend(string("languages"));
        db.extend_from_slice(&[0x00, 0x04]);
        db.extend(string("node_count"));
        db.extend_from_slice(&[0xc1, NODE_COUNT as u8]);
        db.extend(string("record_size"));
        db.extend_from_slice(&[0xa1, 24]);
        db
    }

    #[test]
    fn geoip_database_resolves_registered_country() {
        let mapper = GeoIpCountry::from_bytes(database("NL")).unwrap();

        assert_eq!(mapper.country("10.1.2.3".parse().unwrap()).unwrap(), "NL");
        assert_eq!(country_of(&mapper, "127.0.0.1").unwrap(), "NL");
        assert_eq!(country_of(&mapper, "198.51.100.7").unwrap(), UNKNOWN_COUNTRY);
        assert_eq!(country_of(&mapper, "seed.example.org").unwrap(), UNKNOWN_COUNTRY);
    }

    #[test]
    fn invalid_geoip_databases_are_rejected() {
        assert!(GeoIpCountry::from_bytes(b"not a database".to_vec()).is_err());
        assert!(GeoIpCountry::open("/nonexistent/GeoLite2-Country.mmdb").is_err());
    }

    #[test]
    fn lookup_errors_propagate() {
        let err = country_of(&Failing, "192.0.2.7").unwrap_err();
        assert_eq!(err.to_string(), "country lookup for 192.0.2.7 failed: database closed");
    }
}
