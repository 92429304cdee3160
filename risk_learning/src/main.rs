use std::env;

use anyhow::Context;
use log::info;
use ndarray::{Array1, Array2, Axis, s};
use ndarray_rand::RandomExt;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rand_distr::{Normal, StudentT};
use risk_core::{AuxParam, LinearModel, Loss, Model};
use risk_learning::{
    Algorithm, ExperimentConfig, RiskLoss, ThresholdSetter, base_loss, get_algo, wrap_loss,
};

const DEFAULT_CONFIG: &str = r#"{
    "loss": "quadratic",
    "risk": { "risk_name": "mvHuber", "alpha": 1.0, "beta": 1.0, "lam": 2.0 },
    "algo": {
        "name": "SGD",
        "main": "Ave",
        "step_size": { "inverse_sqrt": { "coef": 0.05 } }
    },
    "n_features": 4,
    "n_samples": 2000,
    "batch_size": 8,
    "epochs": 10,
    "noise": 0.5,
    "seed": 42
}"#;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => ExperimentConfig::from_path(&path).with_context(|| format!("loading {path}"))?,
        None => ExperimentConfig::from_json_str(DEFAULT_CONFIG)?,
    };

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let (x, y, truth) = synthetic(&config, &mut rng)?;
    let base = base_loss(&config.loss, config.exponent)?;
    let (base, loss) = wrap_loss(base, &config.risk)?;

    let model = init_model(&config, &loss, &x, &y)?;
    let (mut algo, mut algo_main) =
        get_algo(&config.algo, &config.risk, model.clone(), loss.clone(), Some(model))?;

    let mut order: Vec<usize> = (0..config.n_samples).collect();
    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);
        for batch in order.chunks_exact(config.batch_size) {
            let xb = x.select(Axis(0), batch);
            let yb = y.select(Axis(0), batch);
            algo.update(xb.view(), yb.view())?;
            if let Some(main) = algo_main.as_mut() {
                main.update(algo.model().params())?;
            }
        }

        let risk = loss.value(algo.model(), x.view(), y.view())?.mean().unwrap_or(f64::NAN);
        let base_risk = base.value(algo.model(), x.view(), y.view())?.mean().unwrap_or(f64::NAN);
        info!(epoch = epoch, risk = risk, base = base_risk; "epoch done");
    }

    let report = |name: &str, model: &LinearModel| {
        let w = model.params().primary(LinearModel::WEIGHTS).map(|w| w.iter().copied().collect::<Vec<_>>());
        println!("{name}: w = {w:?}");
    };
    println!("truth: w = {:?}", truth.to_vec());
    report("ancillary", algo.model());
    if let Some(main) = &algo_main {
        report("averaged", main.model());
    }

    Ok(())
}

/// Linear data with heavy-tailed noise.
fn synthetic(
    config: &ExperimentConfig,
    rng: &mut StdRng,
) -> anyhow::Result<(Array2<f64>, Array2<f64>, Array1<f64>)> {
    let (n, d) = (config.n_samples, config.n_features);
    let x = Array2::random_using((n, d), Normal::new(0.0, 1.0)?, rng);
    let truth = Array1::random_using(d, Normal::new(0.0, 1.0)?, rng);
    let noise = Array1::random_using(n, StudentT::new(2.5)?, rng) * config.noise;

    let mut y = x.dot(&truth) + noise;
    if config.loss == "logistic" || config.loss == "zeroone" {
        y.mapv_inplace(|v| if v > 0.0 { 1.0 } else { 0.0 });
    }

    Ok((x, y.insert_axis(Axis(1)), truth))
}

/// A zero model carrying the auxiliary parameters the risk needs, with
/// thresholds started at the median of the initial losses.
fn init_model(
    config: &ExperimentConfig,
    loss: &RiskLoss,
    x: &Array2<f64>,
    y: &Array2<f64>,
) -> anyhow::Result<LinearModel> {
    let mut model = LinearModel::new(config.n_features);
    let head = x.slice(s![..config.batch_size, ..]);
    let head_y = y.slice(s![..config.batch_size, ..]);
    let initial = loss.base().value(&model, head, head_y)?;
    let centre = ThresholdSetter::Median.apply(&initial)?;

    for &param in loss.aux_params() {
        let value = match param {
            AuxParam::Scale => 1.0,
            AuxParam::Location | AuxParam::Threshold | AuxParam::Theta => centre,
        };
        model = model.with_aux(param, value);
    }

    info!(loss = loss.name().as_str(); "initialised model");
    Ok(model)
}
