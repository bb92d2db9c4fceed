extern crate tensor_spline;

use tensor_spline::{interpolator, DataTable};

fn main() {

    let mut data = DataTable::new(2, 1);
    for i in 0..=6 {
        for j in 0..=6 {
            let x = i as f64 / 6.0 * std::f64::consts::PI;
            let y = j as f64 / 6.0 * std::f64::consts::PI;
            data.add_sample(vec![x, y], vec![x.sin() * y.cos()]).unwrap();
        }
    }

    let spline = interpolator(&data, 3).unwrap();

    let number_of_steps = 30;
    let step = std::f64::consts::PI / number_of_steps as f64;
    let y = 0.25 * std::f64::consts::PI;

    println!("x;y;z;dz/dx");
    for i in 0..=number_of_steps {
        let x = step * i as f64;
        let z = spline.evaluate(&[x, y]).unwrap()[0];
        let jacobian = spline.evaluate_jacobian(&[x, y]).unwrap();
        println!("{:.3};{:.3};{:.4};{:.4}", x, y, z, jacobian[(0, 0)]);
    }
}
