//! Static location gazetteer and WMO weather-code labels.
//!
//! Canonical regions map to coordinates. Two auxiliary keyword lists
//! re-map district and city names to the Seoul or Gyeonggi defaults.

/// A canonical region with its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

const fn region(name: &'static str, latitude: f64, longitude: f64) -> Region {
    Region {
        name,
        latitude,
        longitude,
    }
}

/// Canonical regions in matching order.
pub const REGIONS: &[Region] = &[
    region("청라", 37.535, 126.624),
    region("서울", 37.57, 126.98),
    region("강원도", 37.86, 128.31),
    region("경기도", 37.44, 127.55),
    region("경상남도", 35.44, 128.24),
    region("경상북도", 36.63, 128.96),
    region("광주", 35.16, 126.85),
    region("대구", 35.87, 128.60),
    region("대전", 36.35, 127.38),
    region("부산", 35.18, 129.08),
    region("세종시", 36.48, 127.29),
    region("울산", 35.54, 129.31),
    region("전라남도", 34.90, 126.96),
    region("전라북도", 35.69, 127.24),
    region("제주도", 33.43, 126.58),
    region("충청남도", 36.62, 126.85),
    region("충청북도", 36.79, 127.66),
    region("인천", 37.46, 126.71),
    region("Boston", 42.36, -71.05),
    region("도쿄", 35.68, 139.69),
];

pub const SEOUL: &str = "서울";
pub const GYEONGGI: &str = "경기도";

/// Names that resolve to Seoul when no canonical region matches.
pub const SEOUL_KEYWORDS: &[&str] = &[
    "서울", "강남", "강동", "강북", "강서", "관악", "광진", "구로", "금천", "노원", "도봉",
    "동대문", "동작", "마포", "서대문", "서초", "성동", "성북", "송파", "양천", "영등포",
    "용산", "은평", "종로", "중랑", "홍대", "잠실", "여의도", "명동", "이태원", "성수",
    "압구정", "신촌", "건대",
];

/// Names that resolve to Gyeonggi when no canonical region matches.
pub const GYEONGGI_KEYWORDS: &[&str] = &[
    "경기", "수원", "성남", "고양", "용인", "부천", "안산", "안양", "남양주", "화성", "평택",
    "의정부", "시흥", "파주", "김포", "광명", "하남", "오산", "이천", "구리", "군포", "의왕",
    "양주", "포천", "여주", "동두천", "과천", "가평", "양평", "연천", "분당", "일산", "판교",
    "동탄",
];

/// Exact canonical lookup.
pub fn lookup(name: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.name == name)
}

/// Resolve a free-form location to a canonical region.
///
/// Exact key first, then any Seoul keyword contained in the text, then any
/// Gyeonggi keyword. Returns `None` when nothing applies.
pub fn resolve(location: &str) -> Option<&'static Region> {
    if let Some(r) = lookup(location) {
        return Some(r);
    }
    if SEOUL_KEYWORDS.iter().any(|k| location.contains(k)) {
        return lookup(SEOUL);
    }
    if GYEONGGI_KEYWORDS.iter().any(|k| location.contains(k)) {
        return lookup(GYEONGGI);
    }
    None
}

/// Keywords that `resolve` accepts but free-text extraction must not match.
/// "경기" alone also means a game or match.
pub const RESOLVE_ONLY_KEYWORDS: &[&str] = &["경기"];

/// Candidate names for substring extraction: canonical keys, then Seoul
/// keywords, then Gyeonggi keywords minus [`RESOLVE_ONLY_KEYWORDS`].
pub fn location_keywords() -> impl Iterator<Item = &'static str> {
    REGIONS
        .iter()
        .map(|r| r.name)
        .chain(SEOUL_KEYWORDS.iter().copied())
        .chain(GYEONGGI_KEYWORDS.iter().copied())
        .filter(|k| !RESOLVE_ONLY_KEYWORDS.contains(k))
}

/// Label for unmapped weather codes.
pub const UNKNOWN_WEATHER: &str = "정보 없음";

/// Korean label for a WMO weather code.
pub fn weather_label(code: i64) -> &'static str {
    match code {
        0 => "맑음",
        1 => "부분적으로 흐림",
        2 => "흐림",
        3 => "짙은 흐림",
        45 => "안개",
        48 => "서리 안개",
        51 => "약한 이슬비",
        53 => "이슬비",
        55 => "강한 이슬비",
        61 => "약한 비",
        63 => "비",
        65 => "강한 비",
        80 => "소나기",
        81 => "강한 소나기",
        82 => "매우 강한 소나기",
        95 => "뇌우",
        96 => "우박을 동반한 뇌우",
        99 => "강한 뇌우",
        _ => UNKNOWN_WEATHER,
    }
}
