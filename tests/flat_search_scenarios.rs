//! Integration scenarios for the flat index.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

use vecscan::error::Result;
use vecscan::metric::{inner_product, l2_sqr};
use vecscan::{FlatIndex, Idx, MetricType, NO_LABEL, SearchParameters};

fn random_vectors(rng: &mut StdRng, n: usize, d: usize) -> Vec<f32> {
    (0..n * d).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

/// Brute-force reference: score everything, sort by (score, id), take k.
fn reference_topk(
    database: &[f32],
    query: &[f32],
    d: usize,
    k: usize,
    metric: MetricType,
) -> Vec<(Idx, f32)> {
    let mut scored: Vec<(Idx, f32)> = database
        .chunks_exact(d)
        .enumerate()
        .map(|(id, record)| {
            let score = match metric {
                MetricType::InnerProduct => inner_product(query, record),
                _ => l2_sqr(query, record),
            };
            (id as Idx, score)
        })
        .collect();
    scored.sort_by(|a, b| {
        let ordering = if metric == MetricType::InnerProduct {
            b.1.partial_cmp(&a.1)
        } else {
            a.1.partial_cmp(&b.1)
        };
        ordering
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

#[test]
fn test_concrete_l2_scenario() -> Result<()> {
    let mut index = FlatIndex::l2(2)?;
    index.add(&[0.0, 0.0, 1.0, 0.0, 0.0, 2.0])?;

    let mut distances = [0.0f32; 2];
    let mut labels = [0 as Idx; 2];
    index.search(&[0.0, 0.0], 2, &mut distances, &mut labels)?;

    assert_eq!(labels, [0, 1]);
    assert_eq!(distances, [0.0, 1.0]);
    Ok(())
}

#[test]
fn test_codec_round_trip_is_bit_exact() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let index = FlatIndex::l2(24)?;
    let vectors = random_vectors(&mut rng, 16, 24);

    let mut bytes = vec![0u8; vectors.len() * 4];
    index.sa_encode(&vectors, &mut bytes)?;
    let mut decoded = vec![0.0f32; vectors.len()];
    index.sa_decode(&bytes, &mut decoded)?;

    for (original, back) in vectors.iter().zip(decoded.iter()) {
        assert_eq!(original.to_bits(), back.to_bits());
    }
    Ok(())
}

#[test]
fn test_add_monotonicity() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut index = FlatIndex::l2(8)?;
    assert_eq!(index.code_size(), 32);

    let mut expected = 0;
    for batch in [3usize, 0, 17, 5] {
        let vectors = random_vectors(&mut rng, batch, 8);
        assert_eq!(index.add(&vectors)?, batch);
        expected += batch;
        assert_eq!(index.ntotal(), expected);
        assert_eq!(index.vector_view().len() * 4, expected * index.code_size());
    }
    Ok(())
}

#[test]
fn test_topk_matches_brute_force() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let d = 16;
    let nb = 200;
    let k = 10;
    let database = random_vectors(&mut rng, nb, d);
    let queries = random_vectors(&mut rng, 5, d);

    for metric in [MetricType::L2, MetricType::InnerProduct] {
        let mut index = FlatIndex::new(d, metric)?;
        index.add(&database)?;

        let n = queries.len() / d;
        let mut distances = vec![0.0f32; n * k];
        let mut labels = vec![0 as Idx; n * k];
        index.search(&queries, k, &mut distances, &mut labels)?;

        for (qi, query) in queries.chunks_exact(d).enumerate() {
            let expected = reference_topk(&database, query, d, k, metric);
            for (slot, (id, score)) in expected.into_iter().enumerate() {
                assert_eq!(labels[qi * k + slot], id, "metric {:?} query {qi}", metric);
                assert_eq!(distances[qi * k + slot], score);
            }
        }
    }
    Ok(())
}

#[test]
fn test_padding_when_k_exceeds_ntotal() -> Result<()> {
    let mut index = FlatIndex::l2(4)?;
    index.add(&[0.5; 8])?;

    let k = 6;
    let mut distances = vec![0.0f32; k];
    let mut labels = vec![0 as Idx; k];
    index.search(&[0.0; 4], k, &mut distances, &mut labels)?;

    assert_eq!(&labels[..2], &[0, 1]);
    for slot in 2..k {
        assert_eq!(labels[slot], NO_LABEL);
        assert!(distances[slot].is_infinite());
    }
    Ok(())
}

#[test]
fn test_range_search_matches_brute_force() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let d = 8;
    let database = random_vectors(&mut rng, 150, d);
    let queries = random_vectors(&mut rng, 4, d);
    let radius = 2.0;

    let mut index = FlatIndex::l2(d)?;
    index.add(&database)?;
    let results = index.range_search(&queries, radius)?;

    for (qi, query) in queries.chunks_exact(d).enumerate() {
        let mut expected: Vec<Idx> = database
            .chunks_exact(d)
            .enumerate()
            .filter(|(_, record)| l2_sqr(query, record) <= radius)
            .map(|(id, _)| id as Idx)
            .collect();
        expected.sort_unstable();

        let mut got: Vec<Idx> = results.query(qi).iter().map(|hit| hit.label).collect();
        got.sort_unstable();
        assert_eq!(got, expected, "query {qi}");

        for hit in results.query(qi) {
            let record = &database[hit.label as usize * d..][..d];
            assert_eq!(hit.distance, l2_sqr(query, record));
        }
    }
    Ok(())
}

#[test]
fn test_inner_product_range_keeps_high_similarity() -> Result<()> {
    let mut index = FlatIndex::ip(2)?;
    index.add(&[1.0, 0.0, 0.2, 0.0, -1.0, 0.0])?;

    let results = index.range_search(&[1.0, 0.0], 0.2)?;
    let labels: Vec<Idx> = results.query(0).iter().map(|hit| hit.label).collect();
    assert_eq!(labels, vec![0, 1]);
    Ok(())
}

#[test]
fn test_selector_restricts_scan_subset() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(19);
    let d = 8;
    let database = random_vectors(&mut rng, 60, d);
    let query = random_vectors(&mut rng, 1, d);

    let mut index = FlatIndex::l2(d)?;
    index.add(&database)?;

    let even_only = |id: Idx| id % 2 == 0;
    let params = SearchParameters {
        selector: Some(&even_only),
    };
    let k = 8;
    let mut distances = vec![0.0f32; k];
    let mut labels = vec![0 as Idx; k];
    index.search_with_params(&query, k, &mut distances, &mut labels, &params)?;

    for &label in &labels {
        assert!(label % 2 == 0, "odd id {label} leaked through the selector");
    }
    Ok(())
}

#[test]
fn test_compute_distance_subset_scores_only_given_ids() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(23);
    let d = 8;
    let database = random_vectors(&mut rng, 50, d);
    let query = random_vectors(&mut rng, 1, d);

    let mut index = FlatIndex::l2(d)?;
    index.add(&database)?;

    let candidates = [40 as Idx, 3, 17, NO_LABEL];
    let mut distances = [0.0f32; 4];
    index.compute_distance_subset(&query, 4, &mut distances, &candidates)?;

    for (slot, &id) in candidates.iter().enumerate() {
        if id < 0 {
            assert!(distances[slot].is_infinite());
        } else {
            let record = &database[id as usize * d..][..d];
            assert_eq!(distances[slot], l2_sqr(&query, record));
        }
    }
    Ok(())
}

#[test]
fn test_parallel_batch_matches_sequential() -> Result<()> {
    // Above the parallel threshold the rows must be identical to the
    // one-query-at-a-time answers.
    let mut rng = StdRng::seed_from_u64(31);
    let d = 4;
    let k = 3;
    let nq = 128;
    let database = random_vectors(&mut rng, 80, d);
    let queries = random_vectors(&mut rng, nq, d);

    let mut index = FlatIndex::l2(d)?;
    index.add(&database)?;

    let mut batch_distances = vec![0.0f32; nq * k];
    let mut batch_labels = vec![0 as Idx; nq * k];
    index.search(&queries, k, &mut batch_distances, &mut batch_labels)?;

    for (qi, query) in queries.chunks_exact(d).enumerate() {
        let mut distances = vec![0.0f32; k];
        let mut labels = vec![0 as Idx; k];
        index.search(query, k, &mut distances, &mut labels)?;
        assert_eq!(&batch_labels[qi * k..(qi + 1) * k], &labels[..]);
        assert_eq!(&batch_distances[qi * k..(qi + 1) * k], &distances[..]);
    }
    Ok(())
}
