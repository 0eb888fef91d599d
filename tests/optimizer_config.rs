use ferrodiff::ConfigError;
use ferrodiff::nn::{AdamConfig, AnyOptimizer, Optimizer, OptimizerConfig, Param, SgdConfig};

/// Fits `w` to minimise `(w - 3)²` and returns its final value.
fn fit<O: Optimizer>(optimizer: &O, steps: usize) -> f64 {
    let w = Param::new(0.0f64, optimizer);
    for _ in 0..steps {
        optimizer.tick();
        let d = (&w - 3.0f64).shared();
        (d.clone() * d).backward(1.0);
    }
    optimizer.tick();
    w.apply_pending();
    *w.value()
}

#[test]
fn test_missing_fields_take_defaults() {
    let config = OptimizerConfig::from_toml(
        r#"
        algorithm = "adam"
        lr = 0.01
        beta1 = 0.8
        "#,
    )
    .unwrap();

    assert_eq!(
        config,
        OptimizerConfig::Adam(AdamConfig {
            lr: 0.01,
            beta1: 0.8,
            ..AdamConfig::default()
        })
    );

    let sgd = OptimizerConfig::from_toml(r#"algorithm = "sgd""#).unwrap();
    assert_eq!(sgd, OptimizerConfig::Sgd(SgdConfig::default()));
}

#[test]
fn test_toml_round_trip() {
    let config = OptimizerConfig::Sgd(SgdConfig {
        lr: 0.25,
        grad_clamp: 2.0,
        param_clamp: 10.0,
    });
    let text = config.to_toml().unwrap();
    assert!(text.contains("algorithm = \"sgd\""), "{text}");
    assert_eq!(OptimizerConfig::from_toml(&text).unwrap(), config);
}

#[test]
fn test_unknown_algorithm_fails_to_parse() {
    let err = OptimizerConfig::from_toml(r#"algorithm = "rmsprop""#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err}");
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = OptimizerConfig::from_toml("algorithm = \"sgd\"\nlr = -1.0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "lr", .. }), "{err}");

    let err = OptimizerConfig::from_toml("algorithm = \"adam\"\nbeta2 = 1.0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "beta2", .. }), "{err}");

    let built = OptimizerConfig::Adam(AdamConfig {
        eps: 0.0,
        ..AdamConfig::default()
    })
    .build();
    assert!(matches!(built, Err(ConfigError::Invalid { field: "eps", .. })));
}

#[test]
fn test_configured_sgd_converges() {
    let optimizer = OptimizerConfig::from_toml("algorithm = \"sgd\"\nlr = 0.1")
        .unwrap()
        .build()
        .unwrap();
    assert!(matches!(optimizer, AnyOptimizer::Sgd(_)));

    let w = fit(&optimizer, 300);
    assert!((w - 3.0).abs() < 1e-3, "w = {w}");
}

#[test]
fn test_configured_adam_approaches_minimum() {
    let optimizer = OptimizerConfig::from_toml("algorithm = \"adam\"\nlr = 0.05")
        .unwrap()
        .build()
        .unwrap();
    assert!(matches!(optimizer, AnyOptimizer::Adam(_)));

    let w = fit(&optimizer, 300);
    assert!((w - 3.0).abs() < 0.9, "w = {w}");
}
