// ============================================================
// Layer 5 — BiLSTM Attention Classifier
// ============================================================
// Maps a batch of fixed-length token sequences to raw class
// scores. Forward pass:
//
//   ids [B, S]
//     → embedding (pad rows zeroed) + learned position bias
//     → RecurrentBlock A   (residual Linear ‖ 2-layer BiLSTM → LayerNorm)
//     → RecurrentBlock B   (same pattern)
//     → two AttentionPool heads, averaged          [B, 2H]
//     → fc1 2H→H → ReLU → dropout
//     → fc2 H→H/2 → ReLU → dropout
//     → fc3 H/2→C                                  [B, C]
//
// Softmax is applied by the loss / inference code, not here.
// Dropout is only active on autodiff backends, so running the
// model on an inner backend (`model.valid()`) is inference mode.

use burn::{
    module::Param,
    nn::{
        loss::CrossEntropyLoss,
        BiLstm, BiLstmConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation, Distribution},
};

use crate::error::TrainError;
use crate::infra::tokenizer_store::PAD_ID;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub vocab_size:  usize,
    pub num_classes: usize,
    pub max_seq_len: usize,
    #[config(default = 256)]
    pub embed_dim:   usize,
    #[config(default = 256)]
    pub hidden_size: usize,
    /// Dropout between the two BiLSTM layers of each block
    #[config(default = 0.2)]
    pub recurrent_dropout: f64,
    /// Dropout inside the classification head
    #[config(default = 0.5)]
    pub head_dropout: f64,
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        let dims = [
            ("vocab_size", self.vocab_size),
            ("num_classes", self.num_classes),
            ("max_seq_len", self.max_seq_len),
            ("embed_dim", self.embed_dim),
        ];
        for (name, value) in dims {
            if value == 0 {
                return Err(TrainError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.hidden_size < 2 {
            return Err(TrainError::InvalidConfig("hidden_size must be >= 2".into()));
        }
        for (name, p) in [("recurrent_dropout", self.recurrent_dropout), ("head_dropout", self.head_dropout)] {
            if !(0.0..1.0).contains(&p) {
                return Err(TrainError::InvalidConfig(format!("{name} must be in [0, 1)")));
            }
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> MedicalClassifier<B> {
        let wide = 2 * self.hidden_size;

        let embedding     = EmbeddingConfig::new(self.vocab_size, self.embed_dim).init(device);
        let position_bias = Param::from_tensor(Tensor::random(
            [1, self.max_seq_len, self.embed_dim],
            Distribution::Normal(0.0, 1.0),
            device,
        ));

        let block_a = self.build_block(self.embed_dim, device);
        let block_b = self.build_block(wide, device);

        let pool_a = AttentionPool { score: LinearConfig::new(wide, 1).init(device) };
        let pool_b = AttentionPool { score: LinearConfig::new(wide, 1).init(device) };

        let fc1 = LinearConfig::new(wide, self.hidden_size).init(device);
        let fc2 = LinearConfig::new(self.hidden_size, self.hidden_size / 2).init(device);
        let fc3 = LinearConfig::new(self.hidden_size / 2, self.num_classes).init(device);
        let dropout = DropoutConfig::new(self.head_dropout).init();

        MedicalClassifier {
            embedding, position_bias,
            block_a, block_b,
            pool_a, pool_b,
            fc1, fc2, fc3, dropout,
            max_seq_len: self.max_seq_len,
        }
    }

    fn build_block<B: Backend>(&self, d_input: usize, device: &B::Device) -> RecurrentBlock<B> {
        let wide = 2 * self.hidden_size;
        RecurrentBlock {
            residual: LinearConfig::new(d_input, wide).init(device),
            lstm1:    BiLstmConfig::new(d_input, self.hidden_size, true).init(device),
            lstm2:    BiLstmConfig::new(wide, self.hidden_size, true).init(device),
            dropout:  DropoutConfig::new(self.recurrent_dropout).init(),
            norm:     LayerNormConfig::new(wide).init(device),
        }
    }
}

// ─── RecurrentBlock ───────────────────────────────────────────────────────────
/// Two stacked bidirectional LSTMs with a linear residual branch,
/// followed by layer normalisation of the sum.
#[derive(Module, Debug)]
pub struct RecurrentBlock<B: Backend> {
    pub residual: Linear<B>,
    pub lstm1:    BiLstm<B>,
    pub lstm2:    BiLstm<B>,
    pub dropout:  Dropout,
    pub norm:     LayerNorm<B>,
}

impl<B: Backend> RecurrentBlock<B> {
    /// x: [batch, seq, d_input] → [batch, seq, 2 * hidden]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let residual = self.residual.forward(x.clone());
        let (h, _) = self.lstm1.forward(x, None);
        let (h, _) = self.lstm2.forward(self.dropout.forward(h), None);
        self.norm.forward(h + residual)
    }
}

// ─── AttentionPool ────────────────────────────────────────────────────────────
/// Single-head additive pooling: one scalar score per timestep,
/// softmax over time, weighted sum.
#[derive(Module, Debug)]
pub struct AttentionPool<B: Backend> {
    pub score: Linear<B>,
}

impl<B: Backend> AttentionPool<B> {
    /// x: [batch, seq, d] → [batch, d]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, seq, d] = x.dims();
        let weights = activation::softmax(self.score.forward(x.clone()), 1); // [B, S, 1]
        (x * weights.expand([batch, seq, d]))
            .sum_dim(1)
            .reshape([batch, d])
    }
}

// ─── MedicalClassifier ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct MedicalClassifier<B: Backend> {
    pub embedding:     Embedding<B>,
    pub position_bias: Param<Tensor<B, 3>>,
    pub block_a:       RecurrentBlock<B>,
    pub block_b:       RecurrentBlock<B>,
    pub pool_a:        AttentionPool<B>,
    pub pool_b:        AttentionPool<B>,
    pub fc1:           Linear<B>,
    pub fc2:           Linear<B>,
    pub fc3:           Linear<B>,
    pub dropout:       Dropout,
    pub max_seq_len:   usize,
}

impl<B: Backend> MedicalClassifier<B> {
    /// token_ids: [batch, seq_len] with seq_len <= max_seq_len → logits [batch, num_classes]
    pub fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch, seq_len] = token_ids.dims();
        let seq_len = seq_len.min(self.max_seq_len);
        let token_ids = token_ids.slice([0..batch, 0..seq_len]);

        // Pad ids map to a zero vector.
        let emb = self.embedding.forward(token_ids.clone());
        let [_, _, d] = emb.dims();
        let keep = token_ids
            .equal_elem(PAD_ID as i64)
            .bool_not()
            .float()
            .unsqueeze_dim::<3>(2)
            .expand([batch, seq_len, d]);

        let position = self
            .position_bias
            .val()
            .slice([0..1, 0..seq_len, 0..d])
            .expand([batch, seq_len, d]);

        let x = emb * keep + position;
        let x = self.block_a.forward(x);
        let x = self.block_b.forward(x);

        let pooled = (self.pool_a.forward(x.clone()) + self.pool_b.forward(x)) / 2.0_f64;

        let h = self.dropout.forward(activation::relu(self.fc1.forward(pooled)));
        let h = self.dropout.forward(activation::relu(self.fc2.forward(h)));
        self.fc3.forward(h)
    }

    /// Forward pass plus class-weighted cross-entropy.
    /// Returns (scalar loss [1], logits [batch, num_classes]).
    pub fn forward_loss(
        &self,
        token_ids: Tensor<B, 2, Int>,
        labels:    Tensor<B, 1, Int>,
        loss_fn:   &CrossEntropyLoss<B>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(token_ids);
        let loss = loss_fn.forward(logits.clone(), labels);
        (loss, logits)
    }
}
