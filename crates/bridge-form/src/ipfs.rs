use num_bigint::BigUint;
use url::Url;

/// Public gateway used when the original host cannot serve the metadata.
pub const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs";

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Extract an IPFS content id from a url.
///
/// Recognizes `ipfs://<cid>/...`, path gateways (`https://host/ipfs/<cid>/...`)
/// and subdomain gateways (`https://<cid>.ipfs.host/...`).
pub fn extract_ipfs_cid_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    if parsed.scheme() == "ipfs" {
        // ipfs://<cid>/path, or the non-standard ipfs://ipfs/<cid>/path
        let host = parsed.host_str()?;
        let candidate = if host == "ipfs" {
            parsed.path_segments()?.find(|s| !s.is_empty())?
        } else {
            host
        };
        return is_cid(candidate).then(|| candidate.to_string());
    }

    if let Some(host) = parsed.host_str() {
        if let Some((label, _)) = host.split_once(".ipfs.") {
            if is_cid(label) {
                return Some(label.to_string());
            }
        }
    }

    let mut segments = parsed.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "ipfs" {
            let candidate = segments.next()?;
            return is_cid(candidate).then(|| candidate.to_string());
        }
    }
    None
}

/// `https://ipfs.io/ipfs/{cid}/{token_id}.json`
pub fn gateway_url(cid: &str, token_id: &BigUint) -> String {
    format!("{IPFS_GATEWAY}/{cid}/{token_id}.json")
}

/// CIDv0 (base58btc, `Qm…`, 46 chars) or CIDv1 (multibase base32, `b…`).
fn is_cid(candidate: &str) -> bool {
    if candidate.len() == 46 && candidate.starts_with("Qm") {
        return candidate.chars().all(|c| BASE58_ALPHABET.contains(c));
    }
    let lower = candidate.to_ascii_lowercase();
    lower.len() >= 50
        && lower.starts_with('b')
        && lower
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c))
}
