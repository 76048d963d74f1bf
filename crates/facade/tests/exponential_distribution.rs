use diffpriv::{AccountantStack, DpMechanism, ExponentialBuilder, ExponentialMechanism, SharedRng};

fn unmetered(epsilon: f64, sensitivity: f64, utility: &[f64]) -> ExponentialBuilder<'static> {
    let stack: &'static AccountantStack = Box::leak(Box::new(AccountantStack::new()));
    ExponentialMechanism::builder(epsilon, sensitivity, utility.to_vec()).accountant_stack(stack)
}

fn counts<C>(mech: &ExponentialMechanism<C>, runs: usize, outcomes: usize) -> Vec<usize>
where
    C: Clone + std::fmt::Debug + Into<usize>,
{
    let mut count = vec![0; outcomes];
    for _ in 0..runs {
        count[mech.randomize().expect("draw").into()] += 1;
    }
    count
}

#[test]
fn infinite_epsilon_is_deterministic() {
    let mech = unmetered(f64::INFINITY, 1.0, &[1.0, 0.0, 0.0, 0.0, 0.0])
        .build()
        .expect("valid");
    for _ in 0..1000 {
        assert_eq!(mech.randomize().expect("draw"), 0);
    }
}

#[test]
fn zero_sensitivity_is_deterministic() {
    let mech = unmetered(1.0, 0.0, &[1.0, 0.0, 0.0, 0.0, 0.0])
        .build()
        .expect("valid");
    for _ in 0..1000 {
        assert_eq!(mech.randomize().expect("draw"), 0);
    }
}

#[test]
fn finite_epsilon_favours_high_utility() {
    let mech = unmetered(1.0, 1.0, &[1.0, 0.0, 0.0, 0.0, 0.0])
        .random_state(7u64)
        .build()
        .expect("valid");
    let count = counts(&mech, 10_000, 5);
    assert!(count.iter().all(|&c| c > 0), "{count:?}");
    for &other in &count[1..] {
        assert!(count[0] > other, "{count:?}");
    }
}

#[test]
fn outputs_stay_in_domain() {
    let mech = unmetered(1.0, 1.0, &[1.0, 0.0, 0.0, 0.0, 0.0])
        .build()
        .expect("valid");
    for _ in 0..100 {
        assert!(mech.randomize().expect("draw") < 5);
    }

    let candidates = vec!["A", "B", "C", "D", "F"];
    let mech = unmetered(1.0, 1.0, &[1.0, 0.0, 0.0, 0.0, 0.0])
        .candidates(candidates.clone())
        .build()
        .expect("valid");
    for _ in 0..100 {
        assert!(candidates.contains(&mech.randomize().expect("draw")));
    }
}

#[test]
fn non_uniform_measure_scales_frequencies() {
    let mech = unmetered(2.0 * 2f64.ln(), 1.0, &[1.0, 1.0, 0.0, 0.0])
        .measure(vec![1.0, 2.0, 1.0, 1.0])
        .random_state(0u64)
        .build()
        .expect("valid");
    let count = counts(&mech, 20_000, 4);
    let ratio = count[1] as f64 / count[0] as f64;
    assert!((ratio - 2.0).abs() < 0.2, "ratio {ratio}, counts {count:?}");
}

#[test]
fn zero_measure_is_never_selected() {
    let runs = 10_000;
    let mech = unmetered(1.0, 1.0, &[1.0, 1.0, 1.0])
        .measure(vec![1.0, 1.0, 0.0])
        .random_state(0u64)
        .build()
        .expect("valid");
    let count = counts(&mech, runs, 3);
    assert_eq!(count[2], 0);
    assert!(count[0].abs_diff(count[1]) < runs / 20, "{count:?}");
}

fn max_ratio_over_neighbours(monotonic: bool) -> (f64, f64) {
    let epsilon = 2f64.ln();
    let runs = 10_000;
    let rng = SharedRng::seeded(42);
    let mech1 = unmetered(epsilon, 1.0, &[2.0, 1.0, 0.0])
        .monotonic(monotonic)
        .random_state(&rng)
        .build()
        .expect("valid");
    let mech2 = unmetered(epsilon, 1.0, &[2.0, 1.0, 1.0])
        .monotonic(monotonic)
        .random_state(&rng)
        .build()
        .expect("valid");

    let mut counts = [[0usize; 3]; 2];
    for _ in 0..runs {
        counts[0][mech1.randomize().expect("draw")] += 1;
        counts[1][mech2.randomize().expect("draw")] += 1;
    }

    let worst = (0..3)
        .map(|i| {
            let (a, b) = (counts[0][i] as f64, counts[1][i] as f64);
            a.max(b) / a.min(b)
        })
        .fold(0.0, f64::max);
    (worst, epsilon.exp())
}

#[test]
fn selection_ratio_is_bounded_by_exp_epsilon() {
    let (worst, bound) = max_ratio_over_neighbours(false);
    assert!(worst <= bound + 0.1, "worst ratio {worst}");
}

#[test]
fn monotonic_selection_ratio_is_bounded_by_exp_epsilon() {
    let (worst, bound) = max_ratio_over_neighbours(true);
    assert!(worst <= bound + 0.1, "worst ratio {worst}");
}

#[test]
fn seeded_mechanisms_replay_and_shared_handles_diverge() {
    let mech1 = unmetered(1.0, 1.0, &[2.0, 1.0, 0.0])
        .random_state(42u64)
        .build()
        .expect("valid");
    let mech2 = unmetered(1.0, 1.0, &[2.0, 1.0, 0.0])
        .random_state(42u64)
        .build()
        .expect("valid");
    let draws1: Vec<usize> = (0..100).map(|_| mech1.randomize().expect("draw")).collect();
    let draws2: Vec<usize> = (0..100).map(|_| mech2.randomize().expect("draw")).collect();
    assert_eq!(draws1, draws2);

    let first = mech1.randomize().expect("draw");
    let repeated: Vec<usize> = (0..100).map(|_| mech1.randomize().expect("draw")).collect();
    assert_ne!(vec![first; 100], repeated);

    let shared = unmetered(1.0, 1.0, &[2.0, 1.0, 0.0])
        .random_state(SharedRng::seeded(0))
        .build()
        .expect("valid");
    let seeded: Vec<usize> = (0..100).map(|_| mech1.randomize().expect("draw")).collect();
    let from_handle: Vec<usize> = (0..100).map(|_| shared.randomize().expect("draw")).collect();
    assert_ne!(seeded, from_handle);
}

#[test]
fn describe_names_the_type() {
    let mech = unmetered(1.0, 1.0, &[1.0]).build().expect("valid");
    assert!(mech.describe().contains("::Exponential("));
}
