pub mod batch;
mod corpus;
mod source;

pub use batch::{Batch, BatchGenerator, one_hot_rows};
pub use corpus::TowerCorpora;
pub use source::{load_corpus, read_corpus_text, vocab_path};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatasetSplit {
    Train,
    Val,
}
