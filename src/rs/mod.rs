//! Systematic Reed-Solomon(k, m) codec over GF(2^8).
//!
//! Replaces the teacher's FFI wrapper around Intel ISA-L
//! (`spdk::isal_codec::IsalCodec`, `ec_encode_data`/`gf_invert_matrix`
//! over `extern "C"`) with a pure-Rust codec built on [`crate::gf`] and
//! [`crate::matrix`]. The public shape — a validated config struct,
//! `encode`, `decode`, and a generic `code` — is carried over from
//! `IsalCodecConfig`/`IsalCodec` field-for-field; only the inner loops
//! change from FFI calls into the local SIMD kernel.

use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::gf::GaloisField;
use crate::matrix::Matrix;

/// Configuration for an [`RsCodec`]: `k` data shards, `m` parity shards,
/// and the (uniform) size of every shard in bytes.
///
/// Mirrors the teacher's `IsalCodecConfig` (`data_shards`, `parity_shards`,
/// `shard_size`) minus the SIMD-force override and matrix-type choice,
/// which this crate always derives the same way (see [`RsCodec::new`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsConfig {
    pub data_shards: u8,
    pub parity_shards: u8,
    pub shard_size: usize,
}

impl RsConfig {
    pub fn new(data_shards: u8, parity_shards: u8, shard_size: usize) -> Self {
        Self {
            data_shards,
            parity_shards,
            shard_size,
        }
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards as usize + self.parity_shards as usize
    }

    pub fn overhead_ratio(&self) -> f64 {
        self.parity_shards as f64 / self.data_shards as f64
    }

    pub fn efficiency(&self) -> f64 {
        self.data_shards as f64 / self.total_shards() as f64
    }

    /// Checks `k > 0`, `m > 0`, `k + m <= 255`, and `shard_size > 0`.
    pub fn validate(&self) -> Result<()> {
        if self.data_shards == 0 {
            return Err(Error::InvalidShardCount("data_shards must be > 0".into()));
        }
        if self.parity_shards == 0 {
            return Err(Error::InvalidShardCount(
                "parity_shards must be > 0".into(),
            ));
        }
        if self.total_shards() > 255 {
            return Err(Error::InvalidShardCount(format!(
                "k + m = {} exceeds 255",
                self.total_shards()
            )));
        }
        if self.shard_size == 0 {
            return Err(Error::InvalidShardCount("shard_size must be > 0".into()));
        }
        Ok(())
    }
}

/// A validated Reed-Solomon(k, m) codec over GF(2^8).
///
/// Holds an `(k + m) x k` systematic generator matrix: the top `k` rows
/// are the identity (so data shards pass through unchanged) and the
/// bottom `m` rows are a Cauchy-derived coding matrix, built so that
/// *every* size-`k` subset of the `k + m` rows is invertible — this is
/// what makes decode from any `k` of `n` shards possible.
#[derive(Debug, Clone)]
pub struct RsCodec {
    config: RsConfig,
    gf: GaloisField,
    generator: Matrix,
}

impl RsCodec {
    /// Builds a codec for the given configuration, constructing the
    /// generator matrix.
    ///
    /// The generator is derived from a full `(k + m) x k` Cauchy matrix
    /// `F` over two disjoint point sets (`x_i = i` for `i` in
    /// `[0, k + m)`, `y_j = (k + m) + j` for `j` in `[0, k)`, per
    /// [`Matrix::cauchy`]). `F`'s own top `k x k` block is inverted and
    /// multiplied back in, which turns that block into the identity
    /// while preserving the any-`k`-rows-invertible property of the full
    /// matrix (a Cauchy submatrix times an invertible matrix is still
    /// invertible).
    #[instrument(skip(config), fields(k = config.data_shards, m = config.parity_shards))]
    pub fn new(config: RsConfig) -> Result<Self> {
        config.validate()?;
        let k = config.data_shards as usize;
        let m = config.parity_shards as usize;

        let full = Matrix::cauchy(k + m, k);
        let top_rows: Vec<usize> = (0..k).collect();
        let top = full.sub_matrix_rows(&top_rows);
        let top_inv = top.invert()?;
        let generator = full.multiply(&top_inv);

        debug!("built {}x{} systematic generator matrix", k + m, k);
        Ok(Self {
            config,
            gf: GaloisField::new(),
            generator,
        })
    }

    pub fn config(&self) -> RsConfig {
        self.config
    }

    pub fn data_shards(&self) -> usize {
        self.config.data_shards as usize
    }

    pub fn parity_shards(&self) -> usize {
        self.config.parity_shards as usize
    }

    pub fn total_shards(&self) -> usize {
        self.config.total_shards()
    }

    fn check_shard_size(&self, shards: &[Vec<u8>]) -> Result<()> {
        for s in shards {
            if s.len() != self.config.shard_size {
                return Err(Error::InvalidShardCount(format!(
                    "expected shard_size {}, got {}",
                    self.config.shard_size,
                    s.len()
                )));
            }
        }
        Ok(())
    }

    /// Encodes `k` data shards into the full `k + m` shard set: the
    /// first `k` outputs are the input shards unchanged (systematic),
    /// the last `m` are parity computed from the generator's bottom rows.
    #[instrument(skip(self, data))]
    pub fn encode(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let k = self.data_shards();
        if data.len() != k {
            return Err(Error::InsufficientShards {
                available: data.len(),
                required: k,
            });
        }
        self.check_shard_size(data)?;

        let mut out = Vec::with_capacity(self.total_shards());
        out.extend(data.iter().cloned());

        for parity_row in 0..self.parity_shards() {
            let coeffs = self.generator.row(k + parity_row);
            let mut shard = vec![0u8; self.config.shard_size];
            let mut initialized = false;
            for (i, &c) in coeffs.iter().enumerate() {
                if c == 0 {
                    continue;
                }
                if !initialized {
                    if c == 1 {
                        shard.copy_from_slice(&data[i]);
                    } else {
                        self.gf.mul(&mut shard, &data[i], c);
                    }
                    initialized = true;
                } else if c == 1 {
                    self.gf.add(&mut shard, &data[i]);
                } else {
                    self.gf.mul_add(&mut shard, &data[i], c);
                }
            }
            out.push(shard);
        }
        Ok(out)
    }

    /// Computes requested output shards from any `>= k` available input
    /// shards, expressed as the generic linear-algebra coding operation:
    /// every shard in an `(n, k)` systematic RS code is some fixed linear
    /// combination of any `k` independent shards, so decode is just the
    /// special case where the wanted outputs are exactly the missing
    /// shards.
    ///
    /// `available` is `(shard_index, shard_data)` pairs; `want` is the
    /// list of shard indices (`0..n`) to produce, in order.
    #[instrument(skip(self, available), fields(available = available.len(), want = want.len()))]
    pub fn code(&self, available: &[(usize, &[u8])], want: &[usize]) -> Result<Vec<Vec<u8>>> {
        let k = self.data_shards();
        if available.len() < k {
            return Err(Error::InsufficientShards {
                available: available.len(),
                required: k,
            });
        }
        for (_, buf) in available {
            if buf.len() != self.config.shard_size {
                return Err(Error::InvalidShardCount(format!(
                    "expected shard_size {}, got {}",
                    self.config.shard_size,
                    buf.len()
                )));
            }
        }

        // Use the first k available shards as the invertible basis.
        let basis_indices: Vec<usize> = available[..k].iter().map(|(idx, _)| *idx).collect();
        let basis_matrix = self.generator.sub_matrix_rows(&basis_indices);
        let basis_inv = basis_matrix.invert()?;

        let want_rows = self.generator.sub_matrix_rows(want);
        // combined[w][i] expresses output `want[w]` as a linear
        // combination of the k basis shards.
        let combined = want_rows.multiply(&basis_inv);

        let mut outputs = Vec::with_capacity(want.len());
        for w in 0..want.len() {
            let coeffs = combined.row(w);
            let mut shard = vec![0u8; self.config.shard_size];
            let mut initialized = false;
            for (i, &c) in coeffs.iter().enumerate() {
                if c == 0 {
                    continue;
                }
                if !initialized {
                    if c == 1 {
                        shard.copy_from_slice(available[i].1);
                    } else {
                        self.gf.mul(&mut shard, available[i].1, c);
                    }
                    initialized = true;
                } else if c == 1 {
                    self.gf.add(&mut shard, available[i].1);
                } else {
                    self.gf.mul_add(&mut shard, available[i].1, c);
                }
            }
            outputs.push(shard);
        }
        Ok(outputs)
    }

    /// Reconstructs every missing shard in `shards` in place, given at
    /// least `k` present entries. `shards.len()` must equal `k + m`.
    #[instrument(skip(self, shards))]
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        let n = self.total_shards();
        if shards.len() != n {
            return Err(Error::InvalidShardCount(format!(
                "expected {n} shard slots, got {}",
                shards.len()
            )));
        }

        let available: Vec<(usize, &[u8])> = shards
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|d| (i, d)))
            .collect();

        let k = self.data_shards();
        if available.len() < k {
            return Err(Error::InsufficientShards {
                available: available.len(),
                required: k,
            });
        }

        let missing: Vec<usize> = shards
            .iter()
            .enumerate()
            .filter_map(|(i, s)| if s.is_none() { Some(i) } else { None })
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        warn!(count = missing.len(), "reconstructing missing shards");

        let recovered = self.code(&available, &missing)?;
        for (idx, shard) in missing.into_iter().zip(recovered) {
            shards[idx] = Some(shard);
        }
        Ok(())
    }

    /// Reconstructs only the original `k` data shards and concatenates
    /// them, truncating to `original_size`. A thin convenience over
    /// [`RsCodec::reconstruct`] for the common "get my data back" case.
    pub fn decode(
        &self,
        shards: &mut [Option<Vec<u8>>],
        original_size: usize,
    ) -> Result<Vec<u8>> {
        self.reconstruct(shards)?;
        let k = self.data_shards();
        let mut out = Vec::with_capacity(k * self.config.shard_size);
        for shard in &shards[..k] {
            out.extend_from_slice(shard.as_ref().expect("reconstruct filled every slot"));
        }
        out.truncate(original_size);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(k: u8, m: u8, shard_size: usize) -> RsCodec {
        RsCodec::new(RsConfig::new(k, m, shard_size)).unwrap()
    }

    #[test]
    fn rejects_zero_shard_counts() {
        assert!(RsCodec::new(RsConfig::new(0, 2, 16)).is_err());
        assert!(RsCodec::new(RsConfig::new(2, 0, 16)).is_err());
    }

    #[test]
    fn generator_top_rows_are_identity() {
        let c = codec(4, 2, 16);
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(c.generator.get(i, j), if i == j { 1 } else { 0 });
            }
        }
    }

    #[test]
    fn encode_is_systematic() {
        let c = codec(4, 2, 4);
        let data = vec![
            vec![1, 2, 3, 4],
            vec![5, 6, 7, 8],
            vec![9, 10, 11, 12],
            vec![13, 14, 15, 16],
        ];
        let encoded = c.encode(&data).unwrap();
        assert_eq!(encoded.len(), 6);
        for i in 0..4 {
            assert_eq!(encoded[i], data[i]);
        }
    }

    #[test]
    fn roundtrip_no_loss() {
        let c = codec(4, 2, 4);
        let data = vec![
            vec![1, 2, 3, 4],
            vec![5, 6, 7, 8],
            vec![9, 10, 11, 12],
            vec![13, 14, 15, 16],
        ];
        let encoded = c.encode(&data).unwrap();
        let mut shards: Vec<Option<Vec<u8>>> = encoded.into_iter().map(Some).collect();
        let out = c.decode(&mut shards, 16).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn roundtrip_with_loss_every_erasure_of_rs_8_4() {
        let k = 8usize;
        let m = 4usize;
        let c = codec(k as u8, m as u8, 4);
        let data: Vec<Vec<u8>> = (0..k)
            .map(|i| vec![i as u8, (i * 2) as u8, (i * 3) as u8, (i * 4) as u8])
            .collect();
        let flat: Vec<u8> = data.iter().flatten().copied().collect();
        let encoded = c.encode(&data).unwrap();

        // Exhaustively try every combination of 4 erased shards out of 12.
        let n = k + m;
        for mask in 0u16..(1 << n) {
            if (mask.count_ones() as usize) != m {
                continue;
            }
            let mut shards: Vec<Option<Vec<u8>>> = encoded
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    if mask & (1 << i) != 0 {
                        None
                    } else {
                        Some(s.clone())
                    }
                })
                .collect();
            let out = c.decode(&mut shards, flat.len()).unwrap();
            assert_eq!(out, flat, "failed with erasure mask {mask:012b}");
        }
    }

    #[test]
    fn insufficient_shards_is_reported() {
        let c = codec(4, 2, 4);
        let mut shards: Vec<Option<Vec<u8>>> = vec![Some(vec![0; 4]), Some(vec![0; 4]), None, None, None, None];
        let err = c.reconstruct(&mut shards).unwrap_err();
        assert!(matches!(err, Error::InsufficientShards { available: 2, required: 4 }));
    }

    #[test]
    fn generic_code_can_regenerate_parity_from_other_shards() {
        let c = codec(4, 2, 4);
        let data = vec![vec![9, 8, 7, 6], vec![1, 1, 1, 1], vec![2, 2, 2, 2], vec![3, 3, 3, 3]];
        let encoded = c.encode(&data).unwrap();

        // Use shards 1,2,3 (three of the four data shards) plus parity
        // shard 4 as the available basis; ask for shard 0 (the missing
        // data shard) and shard 5 (a parity shard we didn't keep).
        let available: Vec<(usize, &[u8])> = vec![
            (1, encoded[1].as_slice()),
            (2, encoded[2].as_slice()),
            (3, encoded[3].as_slice()),
            (4, encoded[4].as_slice()),
        ];
        let recomputed = c.code(&available, &[0, 5]).unwrap();
        assert_eq!(recomputed[0], encoded[0]);
        assert_eq!(recomputed[1], encoded[5]);
    }

    #[test]
    fn generic_code_reports_not_invertible_for_a_singular_basis() {
        let c = codec(4, 2, 4);
        let data = vec![vec![9, 8, 7, 6], vec![1, 1, 1, 1], vec![2, 2, 2, 2], vec![3, 3, 3, 3]];
        let encoded = c.encode(&data).unwrap();

        // Shard 0 listed twice: its generator row is repeated, so the
        // claimed basis matrix is singular.
        let available: Vec<(usize, &[u8])> = vec![
            (0, encoded[0].as_slice()),
            (0, encoded[0].as_slice()),
            (2, encoded[2].as_slice()),
            (3, encoded[3].as_slice()),
        ];
        let err = c.code(&available, &[1]).unwrap_err();
        assert!(matches!(err, Error::NotInvertible(_)));
    }
}
