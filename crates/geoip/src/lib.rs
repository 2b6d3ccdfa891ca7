#![doc = include_str!("../README.md")]

use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, Reader};

use conntrackd_core::net;
use conntrackd_core::record::Location;

/// GeoIP 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum GeoipError {
    /// 데이터베이스 열기 실패
    #[error("failed to open geoip database: {0}")]
    Open(#[from] maxminddb::MaxMindDBError),

    /// city 타입이 아닌 데이터베이스
    #[error("not a city database: {path} (type: {database_type})")]
    NotCityDatabase {
        /// 데이터베이스 경로
        path: String,
        /// 메타데이터에 기록된 타입
        database_type: String,
    },
}

/// GeoIP2 City 데이터베이스 리더
///
/// 파이프라인 워커들이 공유 읽기 참조로 동시에 조회합니다.
/// 드롭 시 파일 핸들이 해제됩니다.
pub struct GeoReader {
    reader: Reader<Vec<u8>>,
}

impl GeoReader {
    /// 데이터베이스 파일을 열고 city 타입인지 검증합니다.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GeoipError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening geoip database");

        let reader = Reader::open_readfile(path)?;

        // GeoLite2-City / GeoIP2-City만 위치 좌표를 제공
        if !reader.metadata.database_type.contains("City") {
            return Err(GeoipError::NotCityDatabase {
                path: path.display().to_string(),
                database_type: reader.metadata.database_type.clone(),
            });
        }

        Ok(Self { reader })
    }

    /// 주소의 위치 정보를 조회합니다.
    ///
    /// 예약 주소(루프백/링크로컬/사설/멀티캐스트/미지정)는 조회 없이
    /// `None`을 반환하며, 조회 결과의 모든 필드가 비어 있어도
    /// `None`입니다.
    pub fn lookup(&self, addr: IpAddr) -> Option<Location> {
        if net::is_reserved(addr) {
            return None;
        }

        let result: Result<geoip2::City, _> = self.reader.lookup(addr);
        let record = result.ok()?;

        let country = record
            .country
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|name| (*name).to_owned());

        let city = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|name| (*name).to_owned());

        let (latitude, longitude) = record
            .location
            .as_ref()
            .map(|l| (l.latitude, l.longitude))
            .unwrap_or((None, None));

        let location = Location {
            country,
            city,
            latitude,
            longitude,
        };

        if location.is_empty() {
            return None;
        }

        Some(location)
    }
}

impl std::fmt::Debug for GeoReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoReader")
            .field("database_type", &self.reader.metadata.database_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_missing_file_fails() {
        let err = GeoReader::open("/nonexistent/GeoLite2-City.mmdb").unwrap_err();
        assert!(matches!(err, GeoipError::Open(_)));
    }

    #[test]
    fn open_garbage_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an mmdb file").unwrap();

        let err = GeoReader::open(file.path()).unwrap_err();
        assert!(matches!(err, GeoipError::Open(_)));
    }

    #[test]
    fn reserved_addresses_skip_lookup() {
        // 리더 없이 판정 로직만 확인 (조회 경로는 net::is_reserved에서 단락)
        for addr in ["127.0.0.1", "10.0.0.1", "fe80::1", "ff02::1", "0.0.0.0"] {
            assert!(net::is_reserved(addr.parse().unwrap()), "{addr}");
        }
        assert!(!net::is_reserved("1.1.1.1".parse().unwrap()));
    }
}
