//! Anomaly Detection Models
//!
//! 特徴量スケーリング（標準化）と Isolation Forest による外れ値スコアリング。
//!
//! スコアは `-2^(-E[h(x)] / c(ψ))` で、範囲は `[-1, 0]`。低いほど異常。
//! 判定しきい値（offset）は学習データのスコア分布の
//! `contamination` パーセンタイルで決まる。

use super::features::{FeatureVector, FEATURE_DIM};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Euler–Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// 特徴量ごとの標準化変換
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// 各特徴量の平均値
    pub mean: Vec<f64>,
    /// 各特徴量の標準偏差（0 の場合は 1 に置換済み）
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// 学習データの統計量からスケーラーを作成
    pub fn fit(data: ArrayView2<'_, f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(Error::EmptyCorpus(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InvalidParameter("mean of empty axis".to_string()))?;
        let variance = data.var_axis(Axis(0), 0.0);

        let scale = variance
            .iter()
            .map(|v| {
                let s = v.sqrt();
                // 定数特徴量はスケールしない
                if s.is_finite() && s > f64::EPSILON {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self {
            mean: mean.to_vec(),
            scale,
        })
    }

    /// 行列全体を変換
    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        Array2::from_shape_fn(data.dim(), |(i, j)| {
            standardize(data[[i, j]], self.mean[j], self.scale[j])
        })
    }

    /// 1行を変換（推論用。`transform` と同一の演算）
    pub fn transform_row(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_DIM];
        for (j, value) in row.iter().enumerate() {
            out[j] = standardize(*value, self.mean[j], self.scale[j]);
        }
        out
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

#[inline]
fn standardize(value: f64, mean: f64, scale: f64) -> f64 {
    (value - mean) / scale
}

/// Isolation Forest のハイパーパラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    /// ツリー数
    pub n_estimators: usize,
    /// 各ツリーのサブサンプルサイズ上限
    pub max_samples: usize,
    /// 想定異常率（0, 1）
    pub contamination: f64,
    /// 乱数シード
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            contamination: 0.02,
            seed: 42,
        }
    }
}

impl IsolationForestParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "contamination must be in (0, 1), got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(Error::InvalidParameter(
                "n_estimators must be positive".to_string(),
            ));
        }
        if self.max_samples == 0 {
            return Err(Error::InvalidParameter(
                "max_samples must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// ツリーのノード（配列上のインデックスで子を参照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// 1本の分離木
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: ArrayView2<'_, f64>, indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(data, indices, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        data: ArrayView2<'_, f64>,
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });

        if depth >= max_depth || indices.len() <= 1 {
            return node_id;
        }

        // 値が一定でない特徴量のみ分割候補にする
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| {
                        let v = data[[i, feature]];
                        (lo.min(v), hi.max(v))
                    },
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return node_id;
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data[[i, feature]] <= threshold);

        let left = self.grow_node(data, left_idx, depth + 1, max_depth, rng);
        let right = self.grow_node(data, right_idx, depth + 1, max_depth, rng);

        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    /// 入力がリーフに到達するまでのパス長（リーフ内の残りサンプル分を補正）
    pub fn path_length(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn is_well_formed(&self, n_features: usize) -> bool {
        let len = self.nodes.len();
        // 子ノードは常に親より後ろに配置される（循環参照を排除）
        len > 0
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => *feature < n_features && (i + 1..len).contains(left) && (i + 1..len).contains(right),
                Node::Leaf { .. } => true,
            })
    }
}

/// n 点の二分探索木における不成功探索の平均パス長 c(n)
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation Forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub params: IsolationForestParams,
    /// 実際に使用したサブサンプルサイズ ψ
    pub subsample_size: usize,
    /// 判定しきい値（score - offset < 0 で異常）
    pub offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// スケーリング済み行列からモデルを学習
    pub fn fit(data: ArrayView2<'_, f64>, params: &IsolationForestParams) -> Result<Self> {
        params.validate()?;

        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyCorpus(
                "cannot fit isolation forest on zero rows".to_string(),
            ));
        }

        let subsample_size = params.max_samples.min(n);
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        info!(
            "Fitting isolation forest: samples={}, trees={}, subsample={}, max_depth={}",
            n, params.n_estimators, subsample_size, max_depth
        );

        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                let sample = rand::seq::index::sample(&mut tree_rng, n, subsample_size).into_vec();
                IsolationTree::grow(data, sample, max_depth, &mut tree_rng)
            })
            .collect();

        let mut forest = Self {
            params: params.clone(),
            subsample_size,
            offset: 0.0,
            trees,
        };

        // 学習データ自身のスコア分布から判定しきい値を決める
        let training_scores: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|row| forest.score_sample(&row.to_vec()))
            .collect();
        forest.offset = percentile(&training_scores, 100.0 * params.contamination);

        debug!("Isolation forest offset: {:.6}", forest.offset);
        Ok(forest)
    }

    /// 異常スコア（低いほど異常、範囲 [-1, 0]）
    pub fn score_sample(&self, x: &[f64]) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        let normalizer = average_path_length(self.subsample_size);
        if normalizer == 0.0 {
            // ψ = 1 では全点が同じパス長
            return -0.5;
        }
        -(2f64.powf(-mean_path / normalizer))
    }

    /// しきい値からの距離（負なら異常）
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.score_sample(x) - self.offset
    }

    /// 異常判定
    pub fn is_outlier(&self, x: &[f64]) -> bool {
        self.decision_function(x) < 0.0
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// 読み込んだモデルの構造検証
    pub fn validate_structure(&self, n_features: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::IncompatibleBundle("model has no trees".to_string()));
        }
        if !self.offset.is_finite() {
            return Err(Error::IncompatibleBundle(
                "model offset is not finite".to_string(),
            ));
        }
        if let Some(pos) = self.trees.iter().position(|t| !t.is_well_formed(n_features)) {
            return Err(Error::IncompatibleBundle(format!(
                "tree {} references an unknown feature or node",
                pos
            )));
        }
        Ok(())
    }
}

/// 線形補間によるパーセンタイル（q: 0-100）
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
