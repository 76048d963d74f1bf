use diffpriv::{
    AccountantConfig, DpAccountantConfig, DpMechanism, ExponentialConfig, ExponentialMechanism,
};
use tracing_subscriber::EnvFilter;

fn main() -> diffpriv::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let acc = AccountantConfig::new(2.0, 0.0).create_accountant()?;
    let _scope = acc.activate();

    let mech = ExponentialMechanism::new(0.75, 1.0, vec![4.0, 1.0, 3.0])?;
    let cfg = ExponentialConfig::from_json(
        r#"{"epsilon": 1.0, "sensitivity": 1.0, "utility": [0.0, 2.0],
            "candidates": ["red", "blue"]}"#,
    )?;
    let labelled = cfg.build(None)?;

    println!("index draw: {}", mech.randomize()?);
    println!("label draw: {}", labelled.randomize()?);
    println!("after two draws: {acc}");
    println!("spent {}, remaining {}", acc.total(), acc.remaining());

    match mech.randomize() {
        Ok(index) => println!("unexpected draw: {index}"),
        Err(err) => println!("third draw refused: {err}"),
    }
    Ok(())
}
