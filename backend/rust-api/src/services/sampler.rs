use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::QuizError;
use crate::models::QuizItem;

/// Draws `sample_size` distinct items from the bank in random order.
///
/// Uses a partial Fisher-Yates shuffle over positions, so every ordered
/// sample is equally likely and no item can appear twice. Asking for more
/// items than the bank holds, or for none, is a configuration error.
pub fn sample<R>(
    bank: &[QuizItem],
    sample_size: usize,
    rng: &mut R,
) -> Result<Vec<QuizItem>, QuizError>
where
    R: Rng + ?Sized,
{
    if sample_size == 0 {
        return Err(QuizError::Configuration(
            "sample size must be at least 1".to_string(),
        ));
    }
    if sample_size > bank.len() {
        return Err(QuizError::Configuration(format!(
            "sample size {} exceeds question bank size {}",
            sample_size,
            bank.len()
        )));
    }

    let mut positions: Vec<usize> = (0..bank.len()).collect();
    let (chosen, _) = positions.partial_shuffle(rng, sample_size);

    Ok(chosen.iter().map(|&i| bank[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{HashMap, HashSet};

    fn item(id: usize, category: &str) -> QuizItem {
        QuizItem {
            id: format!("q{}", id),
            prompt_text: format!("Question {}", id),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_option_index: 0,
            category: category.to_string(),
            difficulty: Difficulty::Medium,
            explanation_text: String::new(),
        }
    }

    fn bank(size: usize) -> Vec<QuizItem> {
        (0..size).map(|i| item(i, "General")).collect()
    }

    #[test]
    fn test_sample_returns_k_distinct_items_from_bank() {
        let mut rng = StdRng::seed_from_u64(7);
        for m in 1..=12 {
            let bank = bank(m);
            let bank_ids: HashSet<_> = bank.iter().map(|q| q.id.clone()).collect();
            for k in 1..=m {
                let picked = sample(&bank, k, &mut rng).unwrap();
                assert_eq!(picked.len(), k);
                let ids: HashSet<_> = picked.iter().map(|q| q.id.clone()).collect();
                assert_eq!(ids.len(), k, "duplicate item for m={} k={}", m, k);
                assert!(ids.is_subset(&bank_ids));
            }
        }
    }

    #[test]
    fn test_sample_larger_than_bank_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let bank = bank(20);
        let err = sample(&bank, 25, &mut rng).unwrap_err();
        assert!(matches!(err, QuizError::Configuration(_)));
    }

    #[test]
    fn test_sample_of_zero_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = sample(&bank(3), 0, &mut rng).unwrap_err();
        assert!(matches!(err, QuizError::Configuration(_)));
    }

    #[test]
    fn test_sample_respects_category_counts() {
        let mut bank = Vec::new();
        for i in 0..5 {
            bank.push(item(i, "Phishing"));
        }
        for i in 5..10 {
            bank.push(item(i, "Malware"));
        }
        for i in 10..20 {
            bank.push(item(i, "Social Engineering"));
        }

        let mut rng = StdRng::seed_from_u64(42);
        let picked = sample(&bank, 15, &mut rng).unwrap();
        assert_eq!(picked.len(), 15);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for q in &picked {
            *counts.entry(q.category.as_str()).or_default() += 1;
        }
        assert_eq!(counts.values().sum::<usize>(), 15);
        assert!(counts.get("Phishing").copied().unwrap_or(0) <= 5);
        assert!(counts.get("Malware").copied().unwrap_or(0) <= 5);
        assert!(counts.get("Social Engineering").copied().unwrap_or(0) <= 10);
    }

    #[test]
    fn test_full_sample_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(3);
        let bank = bank(10);
        let picked = sample(&bank, 10, &mut rng).unwrap();
        let mut ids: Vec<_> = picked.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        let mut expected: Vec<_> = bank.iter().map(|q| q.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }
}
