//! A ready-to-use grammar describing (a simplified, bytes-only reading of)
//! RFC 3986 generic URIs. This is the grammar a target list falls back to
//! when its config doesn't name one of its own; it exists so the mutation
//! engine has something grammar-aware to exercise out of the box against
//! URI-shaped inputs.

use crate::{Grammar, GrammarError};

const UNRESERVED: &str = r"(?:[A-Za-z0-9\-._~])";
const PCT_ENCODED: &str = r"(?:%[A-Fa-f0-9][A-Fa-f0-9])";
const SUB_DELIMS: &str = r"(?:[!$&'()*+,;=])";

fn pchar() -> String {
    format!(r"(?:{UNRESERVED}|{PCT_ENCODED}|{SUB_DELIMS}|:|@)")
}

fn segment() -> String {
    format!(r"(?:{}*)", pchar())
}

fn segment_nz() -> String {
    format!(r"(?:{}+)", pchar())
}

fn query_pat() -> String {
    format!(r"(?:{}|/|\?)*", pchar())
}

fn fragment_pat() -> String {
    query_pat()
}

const SCHEME_PAT: &str = r"[A-Za-z][A-Za-z0-9+\-.]*";

fn path_absolute_pat() -> String {
    format!(r"/(?:{}(?:/{})*)?", segment_nz(), segment())
}

const PATH_EMPTY_PAT: &str = r"";

fn path_rootless_pat() -> String {
    format!(r"{}(?:/{})*", segment_nz(), segment())
}

fn path_abempty_pat() -> String {
    format!(r"(?:/{})*", segment())
}

fn userinfo_pat() -> String {
    format!(r"(?:{UNRESERVED}|{PCT_ENCODED}|{SUB_DELIMS}|:)*")
}

const DEC_OCTET_PAT: &str = r"(?:[0-9]|[1-9][0-9]|1[0-9][0-9]|2[0-4][0-9]|25[0-5])";

fn ipv4_pat() -> String {
    format!(r"(?:{DEC_OCTET_PAT}\.{DEC_OCTET_PAT}\.{DEC_OCTET_PAT}\.{DEC_OCTET_PAT})")
}

const H16_PAT: &str = r"(?:[0-9A-Fa-f]{1,4})";

fn ls32_pat() -> String {
    format!(r"(?:{H16_PAT}:{H16_PAT}|{})", ipv4_pat())
}

fn ipv6_pat() -> String {
    let ls32 = ls32_pat();
    let branches = [
        format!(r"(?:{H16_PAT}:){{6}}{ls32}"),
        format!(r"::(?:{H16_PAT}:){{5}}{ls32}"),
        format!(r"(?:{H16_PAT})?::(?:{H16_PAT}:){{4}}{ls32}"),
        format!(r"(?:(?:{H16_PAT}:){{0,1}}{H16_PAT})?::(?:{H16_PAT}:){{3}}{ls32}"),
        format!(r"(?:(?:{H16_PAT}:){{0,2}}{H16_PAT})?::(?:{H16_PAT}:){{2}}{ls32}"),
        format!(r"(?:(?:{H16_PAT}:){{0,3}}{H16_PAT})?::(?:{H16_PAT}:){{1}}{ls32}"),
        format!(r"(?:(?:{H16_PAT}:){{0,4}}{H16_PAT})?::{ls32}"),
        format!(r"(?:(?:{H16_PAT}:){{0,5}}{H16_PAT})?::{H16_PAT}"),
        format!(r"(?:(?:{H16_PAT}:){{0,6}}{H16_PAT})?::"),
    ];
    format!(r"(?:{})", branches.join("|"))
}

fn ip_literal_pat() -> String {
    format!(r"(?:\[{}\])", ipv6_pat())
}

fn reg_name_pat() -> String {
    format!(r"(?:{UNRESERVED}|{PCT_ENCODED}|{SUB_DELIMS})*")
}

fn host_pat() -> String {
    format!(r"(?:{}|{}|{})", ip_literal_pat(), ipv4_pat(), reg_name_pat())
}

// WHATWG-flavored: any sequence of digits that fits a u16, not strictly
// RFC 3986's unbounded `*DIGIT`. Keeps generated ports parseable.
const PORT_PAT: &str = r"(?:0*[1-9]?[0-9]?[0-9]?[0-9]?|0*6553[0-5]|0*655[0-2][0-9]|0*65[0-4][0-9][0-9]|0*6[0-4][0-9][0-9][0-9])";

fn authority_pat() -> String {
    format!(
        r"(?:{}@)?{}(?::{})?",
        userinfo_pat(),
        host_pat(),
        PORT_PAT
    )
}

fn hier_part_pat() -> String {
    format!(
        r"(?://{}{})|{}|{}|{}",
        authority_pat(),
        path_abempty_pat(),
        path_absolute_pat(),
        path_rootless_pat(),
        PATH_EMPTY_PAT
    )
}

fn top_pattern() -> String {
    format!(
        r"(?P<scheme>{SCHEME_PAT}):(?:(?://(?:(?P<userinfo>{})@)?(?P<host>{})(?::(?P<port>{PORT_PAT}))?(?P<path_abempty>{}))|(?P<path_absolute>{})|(?P<path_rootless>{})|(?P<path_empty>{PATH_EMPTY_PAT}))(?:\?(?P<query>{}))?(?:#(?P<fragment>{}))?",
        userinfo_pat(),
        host_pat(),
        path_abempty_pat(),
        path_absolute_pat(),
        path_rootless_pat(),
        query_pat(),
        fragment_pat(),
    )
}

/// Builds the default RFC-3986-derived URI grammar.
///
/// Unlike the RFC grammar proper, `hier-part`'s four alternatives are pulled
/// apart so that `path_abempty`, `path_absolute`, `path_rootless` and
/// `path_empty` are independently named and regenerable, same as `query`,
/// `fragment`, `scheme`, `userinfo`, `host` and `port`.
pub fn uri_grammar() -> Result<Grammar, GrammarError> {
    let rules: Vec<(&str, String)> = vec![
        ("scheme", SCHEME_PAT.to_owned()),
        ("userinfo", userinfo_pat()),
        ("host", host_pat()),
        ("port", PORT_PAT.to_owned()),
        ("path_abempty", path_abempty_pat()),
        ("path_absolute", path_absolute_pat()),
        ("path_rootless", path_rootless_pat()),
        ("path_empty", PATH_EMPTY_PAT.to_owned()),
        ("query", query_pat()),
        ("fragment", fragment_pat()),
    ];
    Grammar::new(&top_pattern(), rules)
}
