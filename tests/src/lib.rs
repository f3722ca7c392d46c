#[cfg(test)]
mod tests {
    use city_graph::*;
    use location_anonymity::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Square grid with hand-placed occupancy.
    fn city(size: usize, occupancy: &[(Id, u32)]) -> CityGraph {
        let mut rng = StdRng::seed_from_u64(0);
        let config = GridConfig {
            size,
            diagonal_chance: 0.0,
        };
        let (mut nodes, edges) = grid_city(&config, &mut rng).unwrap();
        for &(id, users) in occupancy {
            let at = nodes.find_index(&NodeKey(id)).unwrap();
            nodes.occupancy[at] = users;
        }
        CityGraph::new(&nodes, &edges).unwrap()
    }

    /// Path 0-1-2-... with the given occupancies.
    fn path(occupancies: &[u32]) -> CityGraph {
        let nodes: Nodes = occupancies
            .iter()
            .enumerate()
            .map(|(id, &users)| Node {
                id: id as Id,
                coord: geo_types::point! {x: id as f64, y: 0.0},
                occupancy: users,
            })
            .collect();
        let edges: Vec<_> = (1..occupancies.len() as Id).map(|b| (b - 1, b)).collect();
        CityGraph::new(&nodes, &edges).unwrap()
    }

    #[test]
    fn three_by_three_grid_expands_layer_by_layer() {
        // users sit on the corner target and the center only
        let graph = city(3, &[(0, 2), (4, 3)]);
        let engine = AnonymizationEngine::new(FixedK::new(4).unwrap(), EngineOptions::default());

        let result = engine.anonymize(&graph, 0).unwrap();
        // layer 1 {1, 3} holds nobody; layer 2 reaches the center
        assert_eq!(result.region.members, vec![0, 1, 3, 2, 4]);
        assert_eq!(result.region.occupancy, 5);
        assert_eq!(result.density, 2, "nobody lives one hop from the corner");
        assert_eq!(result.effective_k, 4);
    }

    #[test]
    fn three_by_three_grid_respects_the_tie_break_switch() {
        let graph = city(3, &[(0, 2), (4, 3)]);
        let options = EngineOptions {
            tie_break: TieBreak::DescendingId,
            ..EngineOptions::default()
        };
        let engine = AnonymizationEngine::new(FixedK::new(4).unwrap(), options);

        let result = engine.anonymize(&graph, 0).unwrap();
        assert_eq!(result.region.members, vec![0, 3, 1, 6, 4]);
        assert_eq!(result.region.occupancy, 5);
    }

    #[test]
    fn adaptive_thresholds_are_inclusive_on_the_right() {
        // (occupancies along a path, expected density at node 0, expected k)
        let cases = [
            (vec![1, 2, 30], 3u64, 10u32),
            (vec![2, 2, 30], 4, 5),
            (vec![4, 5, 30], 9, 5),
            (vec![5, 5], 10, 2),
            (vec![6, 6], 12, 2),
        ];
        for (occupancies, density, k) in cases {
            let graph = path(&occupancies);
            let engine =
                AnonymizationEngine::new(DensityAdaptiveK::default(), EngineOptions::default());
            let result = engine.anonymize(&graph, 0).unwrap();
            assert_eq!(result.density, density);
            assert_eq!(result.effective_k, k, "density {density} chose the wrong k");
        }
    }

    #[test]
    fn seeded_batches_reproduce_bit_for_bit() {
        let build = || {
            let mut rng = StdRng::seed_from_u64(7);
            let config = GridConfig {
                size: 5,
                diagonal_chance: 0.3,
            };
            let (mut nodes, edges) = grid_city(&config, &mut rng).unwrap();
            populate(&mut nodes, 30, &mut rng).unwrap();
            CityGraph::new(&nodes, &edges).unwrap()
        };
        let run = |graph: &CityGraph| {
            let engine =
                AnonymizationEngine::new(DensityAdaptiveK::default(), EngineOptions::default());
            let runner = ExperimentRunner::new(engine, SamplingStrategy::AllNodes);
            let mut rng = StdRng::seed_from_u64(7);
            runner.run_batch(graph, 20, &mut rng).unwrap()
        };

        let first = run(&build());
        let second = run(&build());
        assert_eq!(first, second);
        assert_eq!(first.len(), 20);
    }

    #[test]
    fn parallel_batches_match_their_own_seed() {
        let graph = city(4, &[(0, 8), (5, 9), (10, 7), (15, 8)]);
        let engine =
            AnonymizationEngine::new(DensityAdaptiveK::default(), EngineOptions::default());
        let runner = ExperimentRunner::new(engine, SamplingStrategy::AllNodes);

        let first = runner.run_batch_parallel(&graph, 32, 123).unwrap();
        let second = runner.run_batch_parallel(&graph, 32, 123).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn plentiful_occupancy_means_full_coverage() {
        let mut rng = StdRng::seed_from_u64(21);
        let config = GridConfig {
            size: 4,
            diagonal_chance: 0.0,
        };
        let (mut nodes, edges) = grid_city(&config, &mut rng).unwrap();
        // total occupancy far above the sparsest k of the default policy
        populate(&mut nodes, 60, &mut rng).unwrap();
        let graph = CityGraph::new(&nodes, &edges).unwrap();

        let engine =
            AnonymizationEngine::new(DensityAdaptiveK::default(), EngineOptions::default());
        let runner = ExperimentRunner::new(engine, SamplingStrategy::AllNodes);
        let log = runner.run_batch(&graph, 40, &mut rng).unwrap();

        let summary = log.aggregate();
        assert_eq!(summary.coverage, 1.0);
        assert_eq!(summary.covered, 40);
        assert_eq!(summary.exhausted, 0);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn scarce_occupancy_shows_up_as_exhausted_runs() {
        let graph = city(3, &[(4, 3)]);
        let engine = AnonymizationEngine::new(FixedK::new(9).unwrap(), EngineOptions::default());
        let runner = ExperimentRunner::new(engine, SamplingStrategy::OccupiedNodes);
        let mut rng = StdRng::seed_from_u64(2);

        let log = runner.run_batch(&graph, 10, &mut rng).unwrap();
        let summary = log.aggregate();
        assert_eq!(summary.exhausted, 10, "3 users can never cover k = 9");
        assert_eq!(summary.coverage, 0.0);
        assert_eq!(summary.min_selected_k, 9);
        assert_eq!(summary.max_selected_k, 9);
    }

    #[test]
    fn hostile_sampler_cannot_sink_a_batch() {
        struct OffGridSampler;

        impl TargetSampler for OffGridSampler {
            fn candidates(&self, _graph: &CityGraph) -> Vec<Id> {
                vec![1_000]
            }
        }

        let graph = city(3, &[(4, 3)]);
        let engine = AnonymizationEngine::new(FixedK::new(2).unwrap(), EngineOptions::default());
        let runner = ExperimentRunner::new(engine, OffGridSampler);
        let mut rng = StdRng::seed_from_u64(0);

        let log = runner.run_batch(&graph, 6, &mut rng).unwrap();
        assert_eq!(log.len(), 6);
        assert_eq!(log.aggregate().failed, 6);
    }

    #[test]
    fn anonymized_location_stays_inside_the_grid() {
        let mut rng = StdRng::seed_from_u64(9);
        let config = GridConfig {
            size: 5,
            diagonal_chance: 0.0,
        };
        let (mut nodes, edges) = grid_city(&config, &mut rng).unwrap();
        populate(&mut nodes, 40, &mut rng).unwrap();
        let graph = CityGraph::new(&nodes, &edges).unwrap();
        let engine = AnonymizationEngine::new(FixedK::new(5).unwrap(), EngineOptions::default());

        for target in 0..25 {
            let result = engine.anonymize(&graph, target).unwrap();
            let centroid = result.region.anonymized;
            assert!((0.0..=4.0).contains(&centroid.x()), "x off grid: {centroid:?}");
            assert!((0.0..=4.0).contains(&centroid.y()), "y off grid: {centroid:?}");
            assert!(result.region.contains(target));
            assert!(result.region.occupancy >= 5);
        }
    }

    #[test]
    fn every_region_is_connected_through_its_members() {
        let mut rng = StdRng::seed_from_u64(31);
        let config = GridConfig {
            size: 5,
            diagonal_chance: 0.5,
        };
        let (mut nodes, edges) = grid_city(&config, &mut rng).unwrap();
        populate(&mut nodes, 25, &mut rng).unwrap();
        let graph = CityGraph::new(&nodes, &edges).unwrap();
        let engine = AnonymizationEngine::new(FixedK::new(6).unwrap(), EngineOptions::default());

        for target in 0..25 {
            let region = engine.anonymize(&graph, target).unwrap().region;
            // each member past the first must touch an earlier member
            for (visited, &member) in region.members.iter().enumerate().skip(1) {
                let neighbors = graph.neighbors(member).unwrap();
                assert!(
                    region.members[..visited]
                        .iter()
                        .any(|earlier| neighbors.contains(earlier)),
                    "member {member} of region around {target} is detached"
                );
            }
        }
    }

    #[test]
    fn queries_do_not_disturb_each_other() {
        let graph = city(3, &[(0, 2), (4, 3)]);
        let engine = AnonymizationEngine::new(FixedK::new(4).unwrap(), EngineOptions::default());

        let before = engine.anonymize(&graph, 0).unwrap();
        for target in [4, 2, 8, 0] {
            let _ = engine.anonymize(&graph, target);
        }
        let after = engine.anonymize(&graph, 0).unwrap();
        assert_eq!(before.region, after.region);
        assert_eq!(before.density, after.density);
    }
}
