//! Loading optimizer configurations from TOML

use std::path::PathBuf;

use inverse_solver::*;

fn demo_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/deblur.toml")
}

#[test]
fn test_load_demo_config() {
    let config = OptimConfig::from_file(demo_config()).unwrap();
    assert_eq!(config.max_iter, 80);
    assert!(config.anderson_acceleration);
    assert_eq!(config.prior.get(SIGMA_DENOISER), Some(&ParamValue::Constant(0.3)));
    assert_eq!(config.params_algo.get(STEPSIZE), Some(&ParamValue::Constant(1.0)));
}

#[test]
fn test_missing_file() {
    let err = OptimConfig::from_file("does/not/exist.toml").unwrap_err();
    assert!(matches!(err, OptimError::ConfigIo(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_unknown_key_rejected() {
    let err = OptimConfig::from_toml_str("max_iters = 10").unwrap_err();
    assert!(matches!(err, OptimError::ConfigParse(_)));
}

#[test]
fn test_criterion_parsing() {
    assert_eq!("residual".parse::<ConvergenceCriterion>().unwrap(), ConvergenceCriterion::Residual);
    assert_eq!("cost".parse::<ConvergenceCriterion>().unwrap(), ConvergenceCriterion::Cost);
    let err = "l2".parse::<ConvergenceCriterion>().unwrap_err();
    assert!(matches!(err, OptimError::UnknownCriterion(ref s) if s == "l2"));
}

#[test]
fn test_config_drives_optimizer() {
    let config = OptimConfig::from_toml_str(
        r#"
        max_iter = 3
        early_stop = false
        return_metrics = false

        [params_algo]
        stepsize = [1.0, 0.5, 0.25]
        lambda = 0.0
        "#,
    )
    .unwrap();
    let optimizer = Optimizer::from_algorithm(
        Algorithm::GradientDescent,
        std::sync::Arc::new(L2::new()),
        std::sync::Arc::new(Tikhonov),
        config,
    )
    .unwrap();

    // λ = 0, A = I, x0 = y: the gradient is zero, the iterate never moves
    let y = Tensor::from_row_slice(1, 2, &[0.3, 0.6]);
    let output = optimizer.run(&y, &Identity, None).unwrap();
    assert_eq!(output.estimate, y);
    assert_eq!(output.stats.iterations, 3);
    assert!(output.metrics.is_none());
}
