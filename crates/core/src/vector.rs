//! Vector serialization and cosine similarity
//!
//! Embeddings are stored as little-endian `f32` blobs — a compact numeric
//! serialization, per spec §9 ("implementer's choice"). Grounded on the
//! teacher's `Embedding::to_bytes`/`from_bytes` (`embeddings/local.rs`).

/// Serialize an embedding vector to its on-disk blob representation.
pub fn to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding vector from its blob representation. Returns
/// `None` if the byte length is not a multiple of 4.
pub fn from_blob(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Cosine similarity between two vectors of equal length. Returns `0.0` for
/// mismatched lengths or when either vector has zero magnitude (spec §8:
/// `cos(v,0) = 0`).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips() {
        let v = vec![1.5_f32, -2.25, 0.0, 3.75];
        let blob = to_blob(&v);
        let back = from_blob(&blob).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn cosine_identities() {
        let v = vec![1.0_f32, 2.0, 3.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        let zero = vec![0.0_f32, 0.0, 0.0];

        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&v, &neg) - (-1.0)).abs() < 1e-9);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);

        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-9);
    }
}
