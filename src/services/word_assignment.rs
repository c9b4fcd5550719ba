use rand::Rng;
use serde::Serialize;

use crate::models::section::SectionKind;

/// Words assigned to each section, indexed by `SectionKind::index`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WordBuckets {
    buckets: [Vec<String>; 3],
}

impl WordBuckets {
    pub fn words_for(&self, section: SectionKind) -> &[String] {
        &self.buckets[section.index()]
    }

    pub fn into_inner(self) -> [Vec<String>; 3] {
        self.buckets
    }
}

pub fn assign_words(words: &[String]) -> WordBuckets {
    assign_words_with_rng(words, &mut rand::thread_rng())
}

/// Puts every word into exactly two of the three sections by leaving it out of
/// one section chosen uniformly at random. Input order is kept in each bucket.
pub fn assign_words_with_rng<R: Rng + ?Sized>(words: &[String], rng: &mut R) -> WordBuckets {
    let mut buckets: [Vec<String>; 3] = Default::default();

    for word in words {
        let excluded = rng.gen_range(0..buckets.len());
        for (i, bucket) in buckets.iter_mut().enumerate() {
            if i != excluded {
                bucket.push(word.clone());
            }
        }
    }

    WordBuckets { buckets }
}
