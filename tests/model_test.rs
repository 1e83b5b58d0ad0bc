//! Ensemble building blocks: autoencoder learning, thresholds, group assignment, state round trip.

use kitnet_detector::config::{AutoencoderConfig, MapperConfig};
use kitnet_detector::model::{assign_groups, percentile, AutoencoderUnit, Ensemble, FeatureMapper};

fn config(learning_rate: f64) -> AutoencoderConfig {
    AutoencoderConfig {
        learning_rate,
        ..Default::default()
    }
}

#[test]
fn autoencoder_learns_a_repeated_pattern() {
    let mut unit = AutoencoderUnit::new(8, &config(0.05), 11);
    assert_eq!(unit.hidden_size(), 6);
    let x = [0.2, 0.8, 0.3, 0.7, 0.4, 0.6, 0.25, 0.75];
    let before = unit.predict(&x);
    for _ in 0..3000 {
        unit.train_step(&x);
    }
    let after = unit.predict(&x);
    assert!(after < before * 0.5, "before {before}, after {after}");
    assert_eq!(unit.train_count(), 3000);
    assert_eq!(unit.history_len(), 1000, "history is capped");
}

#[test]
fn threshold_falls_back_until_history_is_long_enough() {
    let cfg = config(0.01);
    let mut unit = AutoencoderUnit::new(4, &cfg, 3);
    let x = [0.1, 0.9, 0.5, 0.3];
    for _ in 0..cfg.min_history - 1 {
        unit.train_step(&x);
    }
    assert_eq!(unit.threshold(99.0), cfg.fallback_threshold);
    for _ in 0..50 {
        unit.train_step(&x);
    }
    let t = unit.threshold(99.0);
    assert!(t > 0.0 && t < 1.0, "threshold {t}");
}

#[test]
fn same_seed_same_weights() {
    let cfg = config(0.01);
    let a = AutoencoderUnit::new(5, &cfg, 99).to_state();
    let b = AutoencoderUnit::new(5, &cfg, 99).to_state();
    let c = AutoencoderUnit::new(5, &cfg, 100).to_state();
    assert_eq!(a, b);
    assert_ne!(a.w_enc, c.w_enc);
}

#[test]
fn state_round_trip_predicts_identically() {
    let cfg = config(0.05);
    let mut unit = AutoencoderUnit::new(6, &cfg, 5);
    for i in 0..200 {
        let v = (i % 10) as f64 / 10.0;
        unit.train_step(&[v, 1.0 - v, 0.5, v * v, 0.1, 0.9]);
    }
    let restored = AutoencoderUnit::from_state(&unit.to_state(), &cfg).unwrap();
    let probe = [0.3, 0.6, 0.2, 0.9, 0.0, 1.0];
    assert_eq!(unit.predict(&probe), restored.predict(&probe));
}

#[test]
fn malformed_state_is_rejected() {
    let cfg = config(0.01);
    let mut state = AutoencoderUnit::new(4, &cfg, 1).to_state();
    state.w_dec.pop();
    assert!(AutoencoderUnit::from_state(&state, &cfg).is_err());
}

#[test]
fn ensemble_routes_each_group_to_its_unit() {
    let groups = vec![vec![0, 2], vec![1, 3, 4]];
    let mut ensemble = Ensemble::new(groups.clone(), &config(0.05), 7);
    assert_eq!(ensemble.unit_count(), 2);
    assert_eq!(ensemble.combiner().input_size(), 2);
    let x = [0.1, 0.2, 0.3, 0.4, 0.5];
    for _ in 0..50 {
        ensemble.train(&x);
    }
    let errors = ensemble.layer_errors(&x);
    assert_eq!(errors.len(), 2);
    assert!(ensemble.score(&x).is_finite());

    let restored = Ensemble::from_states(
        groups,
        &ensemble.unit_states(),
        &ensemble.combiner_state(),
        &config(0.05),
    )
    .unwrap();
    assert_eq!(restored.score(&x), ensemble.score(&x));
}

#[test]
fn combiner_trains_on_post_update_errors() {
    let mut ensemble = Ensemble::new(vec![vec![0, 1, 2], vec![3, 4]], &config(0.05), 3);
    let x = [0.9, 0.1, 0.4, 0.7, 0.2];
    let before = ensemble.layer_errors(&x);
    let fed = ensemble.train(&x);
    // matches what detection would compute right after the update
    assert_eq!(fed, ensemble.layer_errors(&x));
    assert_ne!(fed, before);
    assert_eq!(ensemble.combiner().train_count(), 1);
}

#[test]
fn ensemble_state_must_match_groups() {
    let ensemble = Ensemble::new(vec![vec![0, 1], vec![2, 3]], &config(0.01), 1);
    let result = Ensemble::from_states(
        vec![vec![0, 1, 2], vec![3]],
        &ensemble.unit_states(),
        &ensemble.combiner_state(),
        &config(0.01),
    );
    assert!(result.is_err());
}

#[test]
fn mapper_groups_correlated_features() {
    let config = MapperConfig {
        buffer_size: 40,
        max_groups: 2,
        ..Default::default()
    };
    let mut mapper = FeatureMapper::new(config, 6);
    for i in 0..39 {
        let a = (i % 5) as f64;
        let b = ((i * 3) % 7) as f64;
        assert!(mapper.add_sample(&[a, b, 2.0 * a, b + 1.0, a + 0.1, 3.0 * b]).is_none());
    }
    assert_eq!(mapper.buffered(), 39);
    assert!(!mapper.is_ready());

    let mut groups = mapper.add_sample(&[1.0, 2.0, 2.0, 3.0, 1.1, 6.0]).unwrap().to_vec();
    groups.sort();
    assert!(mapper.is_ready());
    assert_eq!(mapper.buffered(), 0);
    assert_eq!(groups, vec![vec![0, 2, 4], vec![1, 3, 5]]);
    assert!(mapper.add_sample(&[0.0; 6]).is_none(), "groups are frozen");
    assert_eq!(mapper.groups().unwrap().len(), 2);
}

#[test]
fn group_assignment_covers_all_indices() {
    let labels = [0, 1, 1, 2, 2, 2, 3, 4];
    let groups = assign_groups(&labels, 5, 8, 2);
    let mut all: Vec<usize> = groups.iter().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..8).collect::<Vec<_>>());
    assert!(groups.iter().all(|g| g.len() >= 2));
}

#[test]
fn percentile_interpolates() {
    let v = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(percentile(&v, 50.0), 3.0);
    assert_eq!(percentile(&v, 100.0), 5.0);
    assert!((percentile(&v, 99.0) - 4.96).abs() < 1e-12);
    assert_eq!(percentile(&[], 99.0), 0.0);
}
