//! Validation rule registry.
//!
//! Maps every rule tag a `validate` attribute may name to its stable short
//! code. Codes are grouped by family:
//!
//! | Prefix | Family |
//! |---|---|
//! | `F` | cross-field comparisons |
//! | `N` | network addresses and URLs |
//! | `S` | string content |
//! | `FMT` | well-known formats |
//! | `C` | value comparisons |
//! | `O` | presence, size and set membership |
//! | `A` | aliases |
//!
//! Build one [`RuleRegistry`] at startup and share it; it is never mutated.

use std::collections::HashMap;

static RULE_CODES: &[(&str, &str)] = &[
    ("eqcsfield", "F1"),
    ("eqfield", "F2"),
    ("fieldcontains", "F3"),
    ("fieldexcludes", "F4"),
    ("gtcsfield", "F5"),
    ("gtecsfield", "F6"),
    ("gtefield", "F7"),
    ("gtfield", "F8"),
    ("ltcsfield", "F9"),
    ("ltecsfield", "F10"),
    ("ltefield", "F11"),
    ("ltfield", "F12"),
    ("necsfield", "F13"),
    ("nefield", "F14"),
    ("cidr", "N1"),
    ("cidrv4", "N2"),
    ("cidrv6", "N3"),
    ("datauri", "N4"),
    ("fqdn", "N5"),
    ("hostname", "N6"),
    ("hostname_port", "N7"),
    ("hostname_rfc1123", "N8"),
    ("ip", "N9"),
    ("ip4_addr", "N10"),
    ("ip6_addr", "N11"),
    ("ip_addr", "N12"),
    ("ipv4", "N13"),
    ("ipv6", "N14"),
    ("mac", "N15"),
    ("tcp4_addr", "N16"),
    ("tcp6_addr", "N17"),
    ("tcp_addr", "N18"),
    ("udp4_addr", "N19"),
    ("udp6_addr", "N20"),
    ("udp_addr", "N21"),
    ("unix_addr", "N22"),
    ("uri", "N23"),
    ("url", "N24"),
    ("http_url", "N25"),
    ("url_encoded", "N26"),
    ("urn_rfc2141", "N27"),
    ("alpha", "S1"),
    ("alphanum", "S2"),
    ("alphanumunicode", "S3"),
    ("alphaunicode", "S4"),
    ("ascii", "S5"),
    ("boolean", "S6"),
    ("contains", "S7"),
    ("containsany", "S8"),
    ("containsrune", "S9"),
    ("endsnotwith", "S10"),
    ("endswith", "S11"),
    ("excludes", "S12"),
    ("excludesall", "S13"),
    ("excludesrune", "S14"),
    ("lowercase", "S15"),
    ("multibyte", "S16"),
    ("number", "S17"),
    ("numeric", "S18"),
    ("printascii", "S19"),
    ("startsnotwith", "S20"),
    ("startswith", "S21"),
    ("uppercase", "S22"),
    ("base64", "FMT1"),
    ("base64url", "FMT2"),
    ("base64rawurl", "FMT3"),
    ("bic", "FMT4"),
    ("bcp47_language_tag", "FMT5"),
    ("btc_addr", "FMT6"),
    ("btc_addr_bech32", "FMT7"),
    ("credit_card", "FMT8"),
    ("mongodb", "FMT9"),
    ("cron", "FMT10"),
    ("spicedb", "FMT11"),
    ("datetime", "FMT12"),
    ("e164", "FMT13"),
    ("email", "FMT14"),
    ("eth_addr", "FMT15"),
    ("hexadecimal", "FMT16"),
    ("hexcolor", "FMT17"),
    ("hsl", "FMT18"),
    ("hsla", "FMT19"),
    ("html", "FMT20"),
    ("html_encoded", "FMT21"),
    ("isbn", "FMT22"),
    ("isbn10", "FMT23"),
    ("isbn13", "FMT24"),
    ("issn", "FMT25"),
    ("iso3166_1_alpha2", "FMT26"),
    ("iso3166_1_alpha3", "FMT27"),
    ("iso3166_1_alpha_numeric", "FMT28"),
    ("iso3166_2", "FMT29"),
    ("iso4217", "FMT30"),
    ("json", "FMT31"),
    ("jwt", "FMT32"),
    ("latitude", "FMT33"),
    ("longitude", "FMT34"),
    ("luhn_checksum", "FMT35"),
    ("postcode_iso3166_alpha2", "FMT36"),
    ("postcode_iso3166_alpha2_field", "FMT37"),
    ("rgb", "FMT38"),
    ("rgba", "FMT39"),
    ("ssn", "FMT40"),
    ("timezone", "FMT41"),
    ("uuid", "FMT42"),
    ("uuid3", "FMT43"),
    ("uuid3_rfc4122", "FMT44"),
    ("uuid4", "FMT45"),
    ("uuid4_rfc4122", "FMT46"),
    ("uuid5", "FMT47"),
    ("uuid5_rfc4122", "FMT48"),
    ("uuid_rfc4122", "FMT49"),
    ("md4", "FMT50"),
    ("md5", "FMT51"),
    ("sha256", "FMT52"),
    ("sha384", "FMT53"),
    ("sha512", "FMT54"),
    ("ripemd128", "FMT55"),
    ("tiger128", "FMT57"),
    ("tiger160", "FMT58"),
    ("tiger192", "FMT59"),
    ("semver", "FMT60"),
    ("ulid", "FMT61"),
    ("cve", "FMT62"),
    ("eq", "C1"),
    ("eq_ignore_case", "C2"),
    ("gt", "C3"),
    ("gte", "C4"),
    ("lt", "C5"),
    ("lte", "C6"),
    ("ne", "C7"),
    ("ne_ignore_case", "C8"),
    ("dir", "O1"),
    ("dirpath", "O2"),
    ("file", "O3"),
    ("filepath", "O4"),
    ("image", "O5"),
    ("isdefault", "O6"),
    ("len", "O7"),
    ("max", "O8"),
    ("min", "O9"),
    ("oneof", "O10"),
    ("required", "O11"),
    ("required_if", "O12"),
    ("required_unless", "O13"),
    ("required_with", "O14"),
    ("required_with_all", "O15"),
    ("required_without", "O16"),
    ("required_without_all", "O17"),
    ("excluded_if", "O18"),
    ("excluded_unless", "O19"),
    ("excluded_with", "O20"),
    ("excluded_with_all", "O21"),
    ("excluded_without", "O22"),
    ("excluded_without_all", "O23"),
    ("unique", "O24"),
    ("iscolor", "A1"),
    ("country_code", "A2"),
];

/// Immutable rule tag to code lookup.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    codes: HashMap<&'static str, &'static str>,
}

impl RuleRegistry {
    /// The full built-in table.
    pub fn standard() -> Self {
        Self {
            codes: RULE_CODES.iter().copied().collect(),
        }
    }

    /// Code for a rule tag.
    pub fn code(&self, tag: &str) -> Option<&'static str> {
        self.codes.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.codes.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.codes.iter().map(|(tag, code)| (*tag, *code))
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
