//! Structured-markup normalization for JunOS XML output.
//!
//! Walks `rpc-reply/bgp-information/bgp-peer` elements by name. Absent
//! optional elements map to absent fields, not errors.

use log::debug;
use roxmltree::{Document, Node};

use super::{map_session_state, AsPolicy, CommandOutput, Normalized};
use crate::error::NormalizeError;
use crate::model::{AddressFamily, NeighborRecord, SessionState};

pub(super) fn normalize_junos(
    device: &str,
    outputs: &[CommandOutput],
    policy: &AsPolicy,
) -> Result<Normalized, NormalizeError> {
    let mut normalized = Normalized::default();

    for output in outputs {
        let payload = xml_payload(&output.text)?;
        let doc = Document::parse(payload).map_err(|e| NormalizeError::Markup {
            message: e.to_string(),
        })?;

        for peer in doc
            .descendants()
            .filter(|n| n.has_tag_name("bgp-peer"))
        {
            process_peer(device, &peer, policy, &mut normalized);
        }
    }

    Ok(normalized)
}

fn process_peer(device: &str, peer: &Node<'_, '_>, policy: &AsPolicy, out: &mut Normalized) {
    // The CLI appends the local port to the address of an established
    // peer ("10.0.0.2+179").
    let address = match child_text(peer, "peer-address") {
        Some(raw) => raw.split('+').next().unwrap_or(raw),
        None => {
            debug!("[{device}] Dropping peer without peer-address.");
            out.dropped += 1;
            return;
        }
    };
    let peer_address: std::net::IpAddr = match address.parse() {
        Ok(addr) => addr,
        Err(_) => {
            debug!("[{device}] Dropping peer with invalid address '{address}'.");
            out.dropped += 1;
            return;
        }
    };

    let peer_asn: u32 = match child_text(peer, "peer-as").and_then(|v| v.parse().ok()) {
        Some(asn) => asn,
        None => {
            debug!("[{device}] Dropping peer '{peer_address}' without a parseable ASN.");
            out.dropped += 1;
            return;
        }
    };

    if !policy.admits(peer_asn) {
        debug!("[{device}] Ignoring neighbour '{peer_address}', ASN {peer_asn} excluded by policy.");
        out.filtered += 1;
        return;
    }

    let session_state = child_text(peer, "peer-state")
        .map(map_session_state)
        .unwrap_or(SessionState::Unknown);

    let uptime_seconds = if session_state == SessionState::Established {
        peer.children()
            .find(|n| n.has_tag_name("elapsed-time"))
            .and_then(|n| n.attributes().find(|a| a.name() == "seconds"))
            .and_then(|a| a.value().parse().ok())
    } else {
        None
    };

    let base = NeighborRecord {
        local_device: device.to_string(),
        peer_address,
        peer_asn,
        session_state,
        uptime_seconds,
        prefixes_received: None,
        address_family: AddressFamily::Unknown,
    };

    if session_state != SessionState::Established {
        out.records.push(base);
        return;
    }

    // An established peer carries one RIB entry per address family.
    let ribs: Vec<Node<'_, '_>> = peer
        .children()
        .filter(|n| n.has_tag_name("bgp-rib"))
        .collect();

    if ribs.is_empty() {
        out.records.push(base);
        return;
    }

    for rib in ribs {
        let mut record = base.clone();
        record.address_family = rib_family(child_text(&rib, "name").unwrap_or(""));
        record.prefixes_received = child_text(&rib, "accepted-prefix-count")
            .and_then(|v| v.parse().ok());
        out.records.push(record);
    }
}

/// Map a JunOS RIB name onto an address family.
///
/// `inet.0` is the default-instance IPv4 table; `bgp.l3vpn.0` carries
/// the family in the middle segment; a three-segment `<vrf>.inet.0`
/// form names a routing instance first.
fn rib_family(name: &str) -> AddressFamily {
    let parts: Vec<&str> = name.split('.').collect();
    let family = match parts.len() {
        2 => parts[0],
        3 => parts[1],
        _ => return AddressFamily::Unknown,
    };
    match family {
        "inet" => AddressFamily::Ipv4Unicast,
        "inet6" => AddressFamily::Ipv6Unicast,
        "l3vpn" => AddressFamily::Vpnv4,
        "l3vpn-inet6" => AddressFamily::Vpnv6,
        _ => AddressFamily::Unknown,
    }
}

/// Slice the XML payload out of the raw CLI output, which may surround
/// it with banner text or prompt fragments.
fn xml_payload(text: &str) -> Result<&str, NormalizeError> {
    let start = text.find('<');
    let end = text.rfind('>');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(NormalizeError::Markup {
            message: "no XML payload in output".to_string(),
        }),
    }
}

fn child_text<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUNOS_NEIGHBORS: &str = r#"
<rpc-reply xmlns:junos="http://xml.juniper.net/junos/20.4R0/junos">
  <bgp-information>
    <bgp-peer>
      <peer-address>10.3.3.2+179</peer-address>
      <peer-as>65020</peer-as>
      <peer-state>Established</peer-state>
      <elapsed-time junos:seconds="93784">1d 2:03:04</elapsed-time>
      <bgp-rib>
        <name>inet.0</name>
        <accepted-prefix-count>42</accepted-prefix-count>
      </bgp-rib>
      <bgp-rib>
        <name>inet6.0</name>
        <accepted-prefix-count>7</accepted-prefix-count>
      </bgp-rib>
    </bgp-peer>
    <bgp-peer>
      <peer-address>2001:db8::9</peer-address>
      <peer-as>65021</peer-as>
      <peer-state>Idle</peer-state>
    </bgp-peer>
  </bgp-information>
</rpc-reply>
"#;

    fn normalize(text: &str) -> Normalized {
        normalize_junos(
            "edge1",
            &[CommandOutput::new(None, text)],
            &AsPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_established_peer_one_record_per_rib() {
        let normalized = normalize(JUNOS_NEIGHBORS);
        assert_eq!(normalized.dropped, 0);
        assert_eq!(normalized.records.len(), 3);

        let v4 = &normalized.records[0];
        assert_eq!(v4.peer_address, "10.3.3.2".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(v4.peer_asn, 65020);
        assert_eq!(v4.session_state, SessionState::Established);
        assert_eq!(v4.address_family, AddressFamily::Ipv4Unicast);
        assert_eq!(v4.prefixes_received, Some(42));
        assert_eq!(v4.uptime_seconds, Some(93_784));

        let v6 = &normalized.records[1];
        assert_eq!(v6.address_family, AddressFamily::Ipv6Unicast);
        assert_eq!(v6.prefixes_received, Some(7));
    }

    #[test]
    fn test_down_peer_single_record() {
        let normalized = normalize(JUNOS_NEIGHBORS);
        let down = &normalized.records[2];
        assert_eq!(down.peer_address, "2001:db8::9".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(down.session_state, SessionState::Idle);
        assert_eq!(down.address_family, AddressFamily::Unknown);
        assert_eq!(down.prefixes_received, None);
        assert_eq!(down.uptime_seconds, None);
    }

    #[test]
    fn test_missing_prefix_count_is_absent() {
        let xml = r#"
<rpc-reply>
  <bgp-information>
    <bgp-peer>
      <peer-address>10.9.9.2</peer-address>
      <peer-as>65030</peer-as>
      <peer-state>Established</peer-state>
      <bgp-rib>
        <name>inet.0</name>
      </bgp-rib>
    </bgp-peer>
  </bgp-information>
</rpc-reply>
"#;
        let normalized = normalize(xml);
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].prefixes_received, None);
        assert_eq!(normalized.records[0].address_family, AddressFamily::Ipv4Unicast);
    }

    #[test]
    fn test_peer_without_asn_is_dropped() {
        let xml = r#"
<rpc-reply>
  <bgp-information>
    <bgp-peer>
      <peer-address>10.9.9.3</peer-address>
      <peer-state>Idle</peer-state>
    </bgp-peer>
    <bgp-peer>
      <peer-address>10.9.9.4</peer-address>
      <peer-as>65031</peer-as>
      <peer-state>Idle</peer-state>
    </bgp-peer>
  </bgp-information>
</rpc-reply>
"#;
        let normalized = normalize(xml);
        assert_eq!(normalized.dropped, 1);
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].peer_asn, 65031);
    }

    #[test]
    fn test_vrf_and_vpn_rib_names() {
        assert_eq!(rib_family("inet.0"), AddressFamily::Ipv4Unicast);
        assert_eq!(rib_family("inet6.0"), AddressFamily::Ipv6Unicast);
        assert_eq!(rib_family("bgp.l3vpn.0"), AddressFamily::Vpnv4);
        assert_eq!(rib_family("bgp.l3vpn-inet6.0"), AddressFamily::Vpnv6);
        assert_eq!(rib_family("CUST-A.inet.0"), AddressFamily::Ipv4Unicast);
        assert_eq!(rib_family("mumble"), AddressFamily::Unknown);
    }

    #[test]
    fn test_banner_noise_around_payload() {
        let wrapped = format!("show bgp neighbor | display xml\n{JUNOS_NEIGHBORS}\n{{master:0}}");
        let normalized = normalize(&wrapped);
        assert_eq!(normalized.records.len(), 3);
    }

    #[test]
    fn test_no_xml_payload_is_error() {
        let err = normalize_junos(
            "edge1",
            &[CommandOutput::new(None, "no xml here")],
            &AsPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizeError::Markup { .. }));
    }
}
