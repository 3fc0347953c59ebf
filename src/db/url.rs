// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! `scheme://host:port/database` connection strings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppErrors, ErrorCode};

/// Parsed connection string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUrl {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl ConnectionUrl {
    pub fn parse(url: &str) -> Result<Self, AppErrors> {
        let bad = || AppErrors::single(ErrorCode::BadUrl, format!("bad connection url '{}'", url));

        let (scheme, rest) = url.split_once("://").ok_or_else(bad)?;
        let (authority, database) = rest.split_once('/').ok_or_else(bad)?;
        let (host, port) = authority.rsplit_once(':').ok_or_else(bad)?;

        let is_name = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
            || scheme.is_empty()
            || !is_name(host)
            || !is_name(database)
        {
            return Err(bad());
        }
        let port = port.parse::<u16>().map_err(|_| bad())?;

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_string(),
            port,
            database: database.to_string(),
        })
    }
}

impl FromStr for ConnectionUrl {
    type Err = AppErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}/{}", self.scheme, self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let url = ConnectionUrl::parse("sqlite://localhost:27017/sensors").unwrap();
        assert_eq!(url.scheme, "sqlite");
        assert_eq!(url.host, "localhost");
        assert_eq!(url.port, 27017);
        assert_eq!(url.database, "sensors");
        assert_eq!(url.to_string(), "sqlite://localhost:27017/sensors");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "localhost:27017/sensors",
            "sqlite://localhost/sensors",
            "sqlite://localhost:port/sensors",
            "sqlite://localhost:27017",
            "sqlite://localhost:27017/",
            "sqlite://:27017/sensors",
            "://localhost:1/db",
            "sqlite://localhost:1/a/b",
            "sqlite://localhost:99999/db",
        ] {
            let err = ConnectionUrl::parse(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::BadUrl, "{}", bad);
        }
    }
}
