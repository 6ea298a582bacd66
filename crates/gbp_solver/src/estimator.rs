//! C1 (estimator half): peak-memory / runtime prediction per strategy.
//!
//! A line-by-line port of `wagner_algorithmic_estimator.py`'s
//! `Wagner_Algorithmic_Framework`. Complexities stay in floating point, as in
//! the reference — these are asymptotic bit-complexity predictions used to
//! pick a strategy and its trade-off knobs, not exact allocation sizes.
use crate::params::Params;

/// One strategy's predicted cost: peak memory in bits, and runtime as a
/// multiple of the plain algorithm's baseline `T0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub peak_mem_bits: f64,
    pub runtime: f64,
}

/// Chosen trade-off knobs plus predicted cost for one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub strategy: &'static str,
    pub trimmed_length: Option<u32>,
    pub switching_height1: Option<u32>,
    pub switching_height2: Option<u32>,
    pub activating_height: Option<u32>,
    pub cost: Cost,
}

/// Estimator bound to one `(n, k)` parameter set.
pub struct Estimator<'a> {
    params: &'a Params,
    n: f64,
    k: f64,
    ell: f64,
    big_n: f64,
}

impl<'a> Estimator<'a> {
    pub fn new(params: &'a Params) -> Self {
        Estimator {
            params,
            n: params.n() as f64,
            k: params.k() as f64,
            ell: params.ell() as f64,
            big_n: params.big_n() as f64,
        }
    }

    fn k_int(&self) -> u32 {
        self.params.k()
    }

    /// T1: baseline runtime of the plain k-Tree merge tree.
    pub fn k_tree_time_baseline(&self) -> f64 {
        (2f64.powf(self.k) - 1.0) * 2f64.powf(1.0 + self.ell)
    }

    pub fn k_tree_iv(&self) -> Cost {
        let mem = ((self.k * self.k + 5.0 * self.k + 2.0) / 4.0 + 2f64.powf(self.k - 1.0))
            * self.ell
            * self.big_n;
        Cost {
            peak_mem_bits: mem,
            runtime: self.k_tree_time_baseline(),
        }
    }

    pub fn k_tree_ip(&self) -> Cost {
        let mem = ((self.k * self.k + self.k - 6.0) / 4.0 + 2f64.powf(self.k))
            * self.ell
            * self.big_n;
        Cost {
            peak_mem_bits: mem,
            runtime: self.k_tree_time_baseline(),
        }
    }

    /// Peak memory/time of the k-Tree merge with every leaf list shrunk by
    /// `2^(t+1)` via single-bit trimming (`t = 0` is the untrimmed tree).
    pub fn k_tree_reduced_size(&self, t: u32) -> Cost {
        let n_h = |h: u32| -> f64 {
            (2f64.powf(self.ell - (t as f64) * 2f64.powi(h as i32))).max(1.0)
        };
        let mut mem = self.n * n_h(0) * 2.0;
        let idx_len = self.ell;
        let mut time = 2f64.powf(self.k - 1.0) * 2.0 * n_h(0);
        for i in 1..self.k_int() {
            mem += ((2f64.powi(i as i32)) * idx_len + self.n - (i as f64) * self.ell) * n_h(i);
            time += 2f64.powf(self.k - 1.0 - i as f64) * 2.0 * n_h(i);
        }
        Cost {
            peak_mem_bits: mem,
            runtime: time,
        }
    }

    /// Smallest single-bit trimming depth `t` for which a second, reduced
    /// k-Tree run no longer needs more memory than the untrimmed first run.
    pub fn search_best_k_tree_iv_index_trimming(&self) -> Option<(u32, Cost)> {
        let mem_xor = ((self.k * self.k + 5.0 * self.k + 2.0) / 4.0) * self.ell * self.big_n;
        let mem_idx = |t: u32| 2f64.powf(self.k - 1.0) * (t as f64) * self.big_n;
        let first_run_mem = |t: u32| mem_xor + mem_idx(t);
        let ell_ceil = self.ell.ceil() as u32;
        for t in 1..ell_ceil {
            let first = first_run_mem(t);
            let second = self.k_tree_reduced_size(t);
            tracing::debug!(t, first_run_mem = first, second_run_mem = second.peak_mem_bits, "k_tree trimming candidate");
            if first >= second.peak_mem_bits {
                return Some((
                    t,
                    Cost {
                        peak_mem_bits: first,
                        runtime: self.k_tree_time_baseline() + second.runtime,
                    },
                ));
            }
        }
        None
    }

    pub fn k_tree_iv_it(&self) -> Option<Cost> {
        self.search_best_k_tree_iv_index_trimming().map(|(_, c)| c)
    }

    /// T0: baseline runtime of the plain single-chain merge.
    pub fn single_list_time_baseline(&self) -> f64 {
        self.k * self.big_n
    }

    pub fn single_list_iv(&self) -> Cost {
        let mem = (2f64.powf(self.k - 1.0) * (self.ell + 1.0) + 2.0 * self.ell) * self.big_n;
        Cost {
            peak_mem_bits: mem,
            runtime: self.single_list_time_baseline(),
        }
    }

    /// The height at which a `t`-bit partial-solution constraint first
    /// shrinks a layer below its unconstrained list size.
    ///
    /// Returns `(threshold_h, max_candidates, max_permutations)`, all indexed
    /// by layer height `0..k`.
    pub fn activating_height(&self, t: u32) -> (Option<u32>, Vec<f64>, Vec<f64>) {
        let k = self.k_int();
        let mut max_permutations = vec![2f64.powi(t as i32)];
        let mut max_candidates = vec![2f64.powf(self.k)];
        let mut threshold_h = None;
        let mut found = false;
        for i in 1..k {
            let max_cand_i = 2f64.powi((k - i) as i32);
            let max_perm_i = if !found {
                (2f64.powi(t as i32)).powi(2i32.pow(i))
            } else {
                (max_cand_i * 2.0).powi(2)
            };
            max_candidates.push(max_cand_i);
            max_permutations.push(max_perm_i);
            if max_cand_i < max_perm_i && !found {
                threshold_h = Some(i);
                found = true;
            }
        }
        (threshold_h, max_candidates, max_permutations)
    }

    /// Layer sizes of the single-chain list once the `t`-bit constraint
    /// activates, from layer 0 up to (not including) the final self-merge.
    pub fn civ_list_sizes_with_constraints(&self, t: u32) -> (Option<u32>, Vec<f64>) {
        let (threshold_h, max_candidates, max_permutations) = self.activating_height(t);
        let k = self.k_int();
        let th = threshold_h.unwrap_or(k);
        let mut layer_sizes = Vec::with_capacity(k as usize);
        let mut current = self.big_n;
        for i in 0..k {
            layer_sizes.push(current);
            if i == k - 1 {
                break;
            }
            if th > 0 && i < th - 1 {
                current = current;
            } else {
                current = ((max_candidates[(i + 1) as usize] / max_permutations[(i + 1) as usize])
                    * (current * (current - 1.0) / 2.0)
                    / 2f64.powf(self.ell))
                .max(1.0);
            }
        }
        (threshold_h, layer_sizes)
    }

    /// Search the best `(trimmed_length, switching heights)` trade-off for
    /// single-chain index vector + single-bit index trimming + limited
    /// XOR-removal, bounding the runtime overhead to roughly `2x`-`3x` T0.
    pub fn search_best_single_list_iv_it(&self, xor_removal: bool) -> Option<SingleListIvItSearch> {
        let full_index_vector_size =
            |h: u32| if h == 0 { self.n } else { 2f64.powi(h as i32) * (self.ell + 1.0) + self.n - (h as f64) * self.ell };
        let trimmed_index_vector_size = |h: u32, t: u32| {
            if h == 0 {
                self.n
            } else {
                2f64.powi(h as i32) * (t as f64) + self.n - (h as f64) * self.ell
            }
        };
        let xor_removal_vector_size =
            |h: u32| if h == 0 { 0.0 } else { 2f64.powi(h as i32) * (self.ell + 1.0) };

        let max_xor_removal_depth = (self.k.log2()).floor() as u32;
        let ell_ceil = self.ell.ceil() as u32;
        let k = self.k_int();

        for trimmed_length in 1..ell_ceil {
            tracing::debug!(trimmed_length, "single-chain trimming candidate");
            let first_run_mem_layer_0 = self.n * self.big_n;
            let first_run_mem_layer_k1 = trimmed_index_vector_size(k - 1, trimmed_length) * self.big_n;

            let (first_run_mem, switching_height1, runtime_overhead1) =
                if first_run_mem_layer_0 > first_run_mem_layer_k1 && xor_removal {
                    let mut mem = first_run_mem_layer_0;
                    let mut sh1 = None;
                    let mut overhead1 = 0.0;
                    for d in 0..=max_xor_removal_depth {
                        let layer_d1 = xor_removal_vector_size(d) * self.big_n;
                        let layer_d2 = trimmed_index_vector_size(d + 1, trimmed_length) * self.big_n;
                        let m1 = layer_d1.max(layer_d2).max(first_run_mem_layer_k1);
                        if m1 < first_run_mem_layer_k1 {
                            mem = first_run_mem_layer_k1;
                            sh1 = Some(d + 1);
                            overhead1 = (2f64.powi((d + 1) as i32) - 2.0) * self.big_n;
                            break;
                        }
                        if m1 < mem {
                            mem = m1;
                            sh1 = Some(d + 1);
                            overhead1 = (2f64.powi((d + 1) as i32) - 2.0) * self.big_n;
                        }
                    }
                    (mem, sh1, overhead1)
                } else {
                    (first_run_mem_layer_k1, None, 0.0)
                };

            let (threshold_h, max_candidates, max_permutations) = self.activating_height(trimmed_length);
            let th = threshold_h.unwrap_or(k);
            let mut layer_sizes = Vec::with_capacity(k as usize);
            let mut layer_mems = Vec::with_capacity(k as usize);
            let mut current = self.big_n;
            let mut runtime_overhead2 = 0.0;
            for i in 0..k {
                layer_sizes.push(current);
                layer_mems.push(full_index_vector_size(i) * current);
                runtime_overhead2 += current;
                if i == k - 1 {
                    break;
                }
                if th > 0 && i < th - 1 {
                    current = current;
                } else {
                    current = ((max_candidates[(i + 1) as usize] / max_permutations[(i + 1) as usize])
                        * (current * (current - 1.0) / 2.0)
                        / 2f64.powf(self.ell))
                    .max(1.0);
                }
            }

            let max_layer_mem = layer_mems.iter().cloned().fold(f64::MIN, f64::max);
            if max_layer_mem < first_run_mem {
                return Some(SingleListIvItSearch {
                    peak_mem_bits: first_run_mem,
                    trimmed_length,
                    activating_height: threshold_h,
                    switching_height1,
                    switching_height2: None,
                    runtime_overhead: runtime_overhead1 + runtime_overhead2,
                });
            }

            for d in 0..=(th + 1).min(k.saturating_sub(1)) {
                if (d + 1) as usize >= layer_sizes.len() {
                    break;
                }
                let layer_d1 = (2f64.powi(d as i32) * (self.ell + 1.0)) * layer_sizes[d as usize];
                let layer_d2 = (2f64.powi((d + 1) as i32) * (trimmed_length as f64) + self.n
                    - ((d + 1) as f64) * self.ell)
                    * layer_sizes[(d + 1) as usize];
                let m2 = layer_d1.max(layer_d2);
                if m2 < first_run_mem {
                    let recompute: f64 = (1..=d).map(|h| 2f64.powi(h as i32) * layer_sizes[h as usize]).sum();
                    return Some(SingleListIvItSearch {
                        peak_mem_bits: first_run_mem,
                        trimmed_length,
                        activating_height: threshold_h,
                        switching_height1,
                        switching_height2: Some(d + 1),
                        runtime_overhead: runtime_overhead1 + runtime_overhead2 + recompute,
                    });
                }
            }
        }
        None
    }

    pub fn single_list_iv_it(&self) -> Option<Cost> {
        self.search_best_single_list_iv_it(true).map(|s| Cost {
            peak_mem_bits: s.peak_mem_bits,
            runtime: self.single_list_time_baseline() + s.runtime_overhead,
        })
    }

    pub fn single_list_ip_plain(&self) -> Cost {
        Cost {
            peak_mem_bits: 2.0 * (self.n + self.k - self.ell - 1.0) * self.big_n,
            runtime: self.single_list_time_baseline(),
        }
    }

    pub fn single_list_ip_external_memory(&self) -> Cost {
        Cost {
            peak_mem_bits: self.n * self.big_n,
            runtime: 2.0 * self.single_list_time_baseline(),
        }
    }

    /// Smallest height at which post-retrieval can switch back to plain
    /// index pointers while keeping peak memory at `nN`.
    pub fn search_best_ip_with_post_retrieval(&self) -> Option<(u32, f64)> {
        let k = self.k_int();
        let h_min = (k.saturating_sub(1)) / 2;
        for h in h_min..k {
            let m = ((k - 1 - h) as f64) * 2.0 * (self.ell + 1.0) * self.big_n + 2.0 * self.ell * self.big_n;
            if m <= self.n * self.big_n {
                let overhead = (h as f64) * ((h + 1) as f64) / 2.0 * self.big_n;
                return Some((h, self.single_list_time_baseline() + overhead));
            }
        }
        None
    }

    pub fn single_list_ip_post_retrieval(&self) -> Option<Cost> {
        self.search_best_ip_with_post_retrieval().map(|(_, time)| Cost {
            peak_mem_bits: self.n * self.big_n,
            runtime: time,
        })
    }

    /// Evaluate every strategy applicable to `variant` and return the one
    /// with the lowest predicted peak memory.
    pub fn recommend(&self) -> Plan {
        let mut candidates: Vec<Plan> = vec![
            Plan {
                strategy: "plain_iv",
                trimmed_length: None,
                switching_height1: None,
                switching_height2: None,
                activating_height: None,
                cost: self.single_list_iv(),
            },
            Plan {
                strategy: "plain_ip",
                trimmed_length: None,
                switching_height1: None,
                switching_height2: None,
                activating_height: None,
                cost: self.single_list_ip_plain(),
            },
            Plan {
                strategy: "ip_em",
                trimmed_length: None,
                switching_height1: None,
                switching_height2: None,
                activating_height: None,
                cost: self.single_list_ip_external_memory(),
            },
        ];
        if let Some(s) = self.search_best_single_list_iv_it(true) {
            candidates.push(Plan {
                strategy: "iv_it_star",
                trimmed_length: Some(s.trimmed_length),
                switching_height1: s.switching_height1,
                switching_height2: s.switching_height2,
                activating_height: s.activating_height,
                cost: Cost {
                    peak_mem_bits: s.peak_mem_bits,
                    runtime: self.single_list_time_baseline() + s.runtime_overhead,
                },
            });
        }
        if let Some((h, _)) = self.search_best_ip_with_post_retrieval() {
            if let Some(cost) = self.single_list_ip_post_retrieval() {
                candidates.push(Plan {
                    strategy: "ip_pr",
                    trimmed_length: None,
                    switching_height1: Some(h),
                    switching_height2: None,
                    activating_height: None,
                    cost,
                });
            }
        }

        let plan = candidates
            .into_iter()
            .min_by(|a, b| a.cost.peak_mem_bits.partial_cmp(&b.cost.peak_mem_bits).unwrap())
            .expect("at least plain_iv is always evaluated");
        tracing::info!(strategy = plan.strategy, peak_mem_bits = plan.cost.peak_mem_bits, "estimator recommends a strategy");
        plan
    }
}

/// Result of [`Estimator::search_best_single_list_iv_it`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleListIvItSearch {
    pub peak_mem_bits: f64,
    pub trimmed_length: u32,
    pub activating_height: Option<u32>,
    pub switching_height1: Option<u32>,
    pub switching_height2: Option<u32>,
    pub runtime_overhead: f64,
}
