//! End-to-end checks of the extraction, dedup, classification and
//! renumbering stages through the public API.

use serde_json::json;

use wlmerge::aggregator::{merge_and_deduplicate, Pipeline};
use wlmerge::identity::{extract_host_port, generate_config_key, DedupStrategy};
use wlmerge::link::{encode_vmess, extract_candidates, ParsedLink};
use wlmerge::output::HeaderInfo;
use wlmerge::renumber::Renumberer;
use wlmerge::runlog::RunLog;
use wlmerge::whitelist::WhitelistSet;
use wlmerge::WlmergeError;

fn links(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn vmess(ps: &str) -> String {
    let value = json!({
        "v": "2",
        "ps": ps,
        "add": "95.163.10.20",
        "port": "8443",
        "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
        "net": "ws",
        "path": "/ray",
        "tls": "tls"
    });
    encode_vmess(value.as_object().unwrap()).unwrap()
}

fn whitelist() -> WhitelistSet {
    WhitelistSet::parse(&["95.163.0.0/16"]).unwrap()
}

#[test]
fn test_fragment_difference_collapses_on_both_axes() {
    let input = links(&[
        "vless://uuid1@1.2.3.4:443?security=tls#A",
        "vless://uuid1@1.2.3.4:443?security=tls#B",
    ]);

    let by_host = merge_and_deduplicate(&input, DedupStrategy::HostPort);
    assert_eq!(by_host.unique, vec!["vless://uuid1@1.2.3.4:443?security=tls#A"]);

    let by_params = merge_and_deduplicate(&input, DedupStrategy::Params);
    assert_eq!(by_params.unique, vec!["vless://uuid1@1.2.3.4:443?security=tls#A"]);
    assert_eq!(by_params.identity_duplicates, 1);
}

#[test]
fn test_same_endpoint_different_credentials() {
    let input = links(&[
        "vless://uuid1@1.2.3.4:443?security=tls#A",
        "vless://uuid2@1.2.3.4:443?security=tls#B",
    ]);

    assert_eq!(merge_and_deduplicate(&input, DedupStrategy::HostPort).unique.len(), 1);
    assert_eq!(merge_and_deduplicate(&input, DedupStrategy::Params).unique.len(), 2);
}

#[test]
fn test_malformed_vmess_is_kept() {
    let bad = "vmess://%%%not-base64%%%";
    assert_eq!(extract_host_port(bad), None);

    let pipeline = Pipeline::new(DedupStrategy::Params, whitelist(), None);
    let input = links(&[bad, "trojan://pw@example.com:443#t"]);
    let output = pipeline.run(&input, &RunLog::new()).unwrap();

    assert_eq!(output.merged.links(), &input[..]);
    assert_eq!(output.unidentified, 1);
    assert!(output.whitelist.is_empty());
}

#[test]
fn test_already_numbered_link_is_unchanged() {
    let renumberer = Renumberer::default();
    let link = "vless://uuid1@1.2.3.4:443?security=tls#3. 🇷🇺VLESS | TG: @wlrustg";
    assert_eq!(renumberer.renumber_one(link, 7), link);
}

#[test]
fn test_whitelist_scenario() {
    let wl = whitelist();
    assert!(wl.is_ip_in_subnets("95.163.4.10"));
    assert!(!wl.is_ip_in_subnets("95.164.4.10"));
    assert!(wl.is_whitelisted("vless://u@95.163.4.10:443#x"));
    assert!(!wl.is_whitelisted("vless://u@95.164.4.10:443#x"));
}

#[test]
fn test_renumbered_vmess_copies_share_a_key() {
    let original = vmess("🇷🇺 Moscow");
    let renumbered = Renumberer::default().renumber_one(&original, 4);

    assert_ne!(original, renumbered);
    assert_eq!(
        ParsedLink::parse(&renumbered).display_name().as_deref(),
        Some("4. 🇷🇺VMESS | TG: @wlrustg")
    );
    assert_eq!(generate_config_key(&original), generate_config_key(&renumbered));

    let outcome = merge_and_deduplicate(&[original.clone(), renumbered], DedupStrategy::Params);
    assert_eq!(outcome.unique, vec![original]);
}

#[test]
fn test_key_ignores_surrounding_whitespace() {
    let link = vmess("node");
    assert_eq!(generate_config_key(&link), generate_config_key(&format!("  {}\t", link)));
}

#[test]
fn test_empty_run_is_fatal() {
    let pipeline = Pipeline::new(DedupStrategy::Params, whitelist(), None);
    let err = pipeline.run(&[], &RunLog::new()).unwrap_err();
    assert!(matches!(err, WlmergeError::NoCandidates));
}

#[test]
fn test_full_flow_from_concatenated_blob() {
    let blob = format!(
        "# header comment\n\
         vless://uuid1@95.163.4.10:443?security=tls#🇷🇺 A\
         vless://uuid1@95.163.4.10:443?security=tls#B\n\
         trojan://pw@example.com:443?sni=example.com#C\n\
         {}\n\
         short\n\
         user@host.example:8080:extra\n",
        vmess("🇩🇪 Berlin")
    );

    let candidates = extract_candidates(&blob);
    assert_eq!(candidates.len(), 5);

    let log = RunLog::new();
    let pipeline = Pipeline::new(DedupStrategy::Params, whitelist(), Some(Renumberer::default()));
    let output = pipeline.run(&candidates, &log).unwrap();

    assert_eq!(output.candidates, 5);
    assert_eq!(output.merged.len(), 4);
    assert_eq!(output.identity_duplicates, 1);

    let names: Vec<String> = output
        .merged
        .links()
        .iter()
        .filter_map(|l| ParsedLink::parse(l).display_name())
        .collect();
    assert_eq!(names[0], "1. 🇷🇺VLESS | TG: @wlrustg");
    assert_eq!(names[1], "2. TROJAN | TG: @wlrustg");
    assert_eq!(names[2], "3. 🇩🇪VMESS | TG: @wlrustg");

    // Whitelist set is numbered on its own
    assert_eq!(output.whitelist.len(), 2);
    let wl_names: Vec<String> = output
        .whitelist
        .links()
        .iter()
        .filter_map(|l| ParsedLink::parse(l).display_name())
        .collect();
    assert_eq!(wl_names, vec!["1. 🇷🇺VLESS | TG: @wlrustg", "2. 🇩🇪VMESS | TG: @wlrustg"]);

    let rendered = output.whitelist.render(&HeaderInfo {
        sources: Some(3),
        updated: "12:00 | 01.03.2026".to_string(),
        whitelist_subnets: Some(1),
    });
    assert!(rendered.starts_with(
        "# Whitelist configs (sources: 3)\n# Updated: 12:00 | 01.03.2026\n# Total configs: 2\n# Whitelist subnets: 1\n"
    ));
    assert!(!log.is_empty());
}

#[test]
fn test_dedup_is_idempotent_on_its_output() {
    let input = links(&[
        "vless://uuid1@1.2.3.4:443?security=tls#A",
        "vless://uuid1@1.2.3.4:443?security=tls#B",
        "vless://uuid2@1.2.3.4:443?security=reality&pbk=k#C",
        "ss://YWVzLTI1Ni1nY206cGFzcw@5.6.7.8:8388#D",
        "ss://YWVzLTI1Ni1nY206cGFzcw@5.6.7.8:8388#D",
        "garbage-without-endpoint-but-long",
    ]);

    for strategy in [DedupStrategy::HostPort, DedupStrategy::Params] {
        let once = merge_and_deduplicate(&input, strategy);
        let twice = merge_and_deduplicate(&once.unique, strategy);
        assert_eq!(once.unique, twice.unique);
        assert_eq!(twice.dropped(), 0);
    }
}
