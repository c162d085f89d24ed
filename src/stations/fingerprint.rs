use sha2::{Digest, Sha256};

use super::{Snapshot, Station};

/// Content hash of a snapshot. Station lists are hashed in order because
/// order is part of what callers see; maps are hashed by sorted key.
pub fn build_snapshot_fingerprint(snapshot: &Snapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.country_id.as_bytes());
    hasher.update(b"\n");

    hash_stations(&mut hasher, b"top", &snapshot.top_stations);
    hash_stations(&mut hasher, b"all", &snapshot.all_stations);

    let mut cluster_ids: Vec<&String> = snapshot.variants.keys().collect();
    cluster_ids.sort();
    for id in cluster_ids {
        hasher.update(b"cluster:");
        hasher.update(id.as_bytes());
        if let Some(cluster) = snapshot.variants.get(id) {
            for member in &cluster.variants {
                hasher.update(b"|");
                hasher.update(member.id.as_bytes());
            }
        }
        hasher.update(b"\n");
    }

    let mut scored: Vec<(&String, &i64)> = snapshot.brand_scores.iter().collect();
    scored.sort();
    for (id, score) in scored {
        hasher.update(format!("score:{id}={score}\n").as_bytes());
    }

    hex::encode(hasher.finalize())
}

fn hash_stations(hasher: &mut Sha256, label: &[u8], stations: &[Station]) {
    hasher.update(label);
    hasher.update(b"\n");
    for station in stations {
        // Station serialization cannot fail; fall back to the id regardless.
        match serde_json::to_vec(station) {
            Ok(serialized) => hasher.update(serialized),
            Err(_) => hasher.update(station.id.as_bytes()),
        }
        hasher.update(b"\n");
    }
}
