extern crate tensor_spline;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tensor_spline::{Builder, DataTable, KnotSpacing, Smoothing};

fn main() {

    let x_min = 0.0;
    let x_max = 6.0;
    let number_of_samples = 120;

    let mut rng = StdRng::seed_from_u64(1);
    let mut data = DataTable::new(1, 1);
    for i in 0..number_of_samples {
        let x = x_min + (x_max - x_min) * i as f64 / (number_of_samples - 1) as f64;
        let noise = rng.gen_range(-0.25..0.25);
        data.add_sample(vec![x], vec![x.sin() + noise]).unwrap();
    }

    let builder = Builder::new(1, 1)
        .degree(3)
        .num_basis_functions(25)
        .knot_spacing(KnotSpacing::Equidistant)
        .smoothing(Smoothing::PSpline);

    let rough = builder.clone().alpha(0.01).fit(&data).unwrap();
    let smooth = builder.alpha(10.0).fit(&data).unwrap();

    let points: Vec<Vec<f64>> = data.samples().iter().map(|s| s.x().to_vec()).collect();
    let rough_values = rough.evaluate_batch(&points).unwrap();
    let smooth_values = smooth.evaluate_batch(&points).unwrap();

    println!("x;sample;alpha=0.01;alpha=10");
    for (i, sample) in data.samples().iter().enumerate() {
        println!(
            "{:.2};{:.3};{:.3};{:.3}",
            sample.x()[0], sample.y()[0], rough_values[i][0], smooth_values[i][0]
        );
    }
}
