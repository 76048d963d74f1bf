use diffpriv::{DpMechanism, ExponentialMechanism};
use tracing_subscriber::EnvFilter;

fn main() -> diffpriv::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let grades = vec!["A", "B", "C", "D", "F"];
    let votes = vec![12.0, 30.0, 21.0, 5.0, 2.0];

    let mech = ExponentialMechanism::builder(1.0, 1.0, votes)
        .candidates(grades.clone())
        .monotonic(true)
        .random_state(2024u64)
        .build()?;
    println!("{mech}");

    for (grade, p) in grades.iter().zip(mech.probabilities()?.iter()) {
        println!("P({grade}) = {p:.4}");
    }
    println!("selected: {}", mech.randomize()?);
    Ok(())
}
