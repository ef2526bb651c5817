use std::collections::{HashMap, HashSet};

use crate::catalog::FoodId;
use crate::search::similarity::{cosine_similarity, max_similarity};
use crate::store::{MealStore, StoreError};

/// Parses a stored embedding such as `"0.12, -0.5, 3e-2"`.
///
/// Blank text, or text with any token that is not a finite number, yields an
/// empty vector: a malformed embedding is treated as absent.
pub fn parse_embedding(text: &str) -> Vec<f32> {
    let trimmed = text.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.trim().is_empty() {
        return Vec::new();
    }
    let parsed: Option<Vec<f32>> = trimmed
        .split(',')
        .map(|token| token.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
        .collect();
    parsed.unwrap_or_default()
}

/// Embeddings fetched in one batch for the foods a search will touch.
#[derive(Debug, Default, Clone)]
pub struct EmbeddingLookup {
    vectors: HashMap<FoodId, Vec<f32>>,
}

impl EmbeddingLookup {
    pub fn fetch<S, I>(store: &S, food_ids: I) -> Result<Self, StoreError>
    where
        S: MealStore + ?Sized,
        I: IntoIterator<Item = FoodId>,
    {
        let wanted: HashSet<FoodId> = food_ids.into_iter().collect();
        if wanted.is_empty() {
            return Ok(EmbeddingLookup::default());
        }
        Ok(EmbeddingLookup { vectors: store.embeddings_for(&wanted)? })
    }

    pub fn get(&self, food_id: FoodId) -> Option<&[f32]> {
        self.vectors.get(&food_id).map(Vec::as_slice).filter(|v| !v.is_empty())
    }

    /// Vectors for the given ids, skipping foods that have none.
    pub fn vectors_for(&self, food_ids: &[FoodId]) -> Vec<&[f32]> {
        food_ids.iter().filter_map(|&id| self.get(id)).collect()
    }

    /// Similarity of one food to the closest previous vector, 0.0 when the
    /// food has no vector or there is nothing to compare against.
    pub fn novelty_penalty(&self, food_id: FoodId, previous: &[&[f32]]) -> f64 {
        match self.get(food_id) {
            Some(vector) if !previous.is_empty() => max_similarity(vector, previous),
            _ => 0.0,
        }
    }

    /// Similarity between two foods' vectors, 0.0 if either is missing.
    pub fn similarity(&self, a: Option<FoodId>, b: Option<FoodId>) -> f64 {
        match (a.and_then(|id| self.get(id)), b.and_then(|id| self.get(id))) {
            (Some(va), Some(vb)) => cosine_similarity(va, vb),
            _ => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Food, FoodRole};
    use crate::store::InMemoryStore;

    #[test]
    fn test_parse_embedding() {
        assert_eq!(parse_embedding("1, 2.5,-3"), vec![1.0, 2.5, -3.0]);
        assert_eq!(parse_embedding("[0.5,0.25]"), vec![0.5, 0.25]);
        assert!(parse_embedding("").is_empty());
        assert!(parse_embedding("   ").is_empty());
        assert!(parse_embedding("1,abc,3").is_empty());
        assert!(parse_embedding("1,,3").is_empty());
        assert!(parse_embedding("NaN,1").is_empty());
    }

    #[test]
    fn test_lookup_fetches_and_scores() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new();
        store.upsert_foods(vec![
            Food::new(1, "a", FoodRole::Rice, "").with_embedding(vec![1.0, 0.0]),
            Food::new(2, "b", FoodRole::Soup, "").with_embedding(vec![0.0, 1.0]),
            Food::new(3, "c", FoodRole::Soup, ""),
        ]);
        let lookup = EmbeddingLookup::fetch(&store, vec![1, 2, 3, 1])?;
        assert_eq!(lookup.len(), 2);
        assert!(lookup.get(3).is_none());

        let previous = lookup.vectors_for(&[1, 3]);
        assert_eq!(previous.len(), 1);
        assert!((lookup.novelty_penalty(1, &previous) - 1.0).abs() < 1e-9);
        assert_eq!(lookup.novelty_penalty(2, &previous), 0.0);
        assert_eq!(lookup.novelty_penalty(3, &previous), 0.0);
        assert_eq!(lookup.novelty_penalty(1, &[]), 0.0);

        assert_eq!(lookup.similarity(Some(1), None), 0.0);
        assert_eq!(lookup.similarity(Some(1), Some(2)), 0.0);
        Ok(())
    }

    #[test]
    fn test_fetch_with_no_ids_skips_store() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        let lookup = EmbeddingLookup::fetch(&store, Vec::new())?;
        assert!(lookup.is_empty());
        Ok(())
    }
}
