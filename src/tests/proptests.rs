use faer::Mat;
use proptest::prelude::*;

use crate::mesh::{interval_widths, modify_mesh};
use crate::spline::CubicSpline;

proptest! {
    #[test]
    fn insertion_preserves_order_and_never_removes(
        widths in prop::collection::vec(0.01f64..1.0, 1..16),
        flags in prop::collection::vec(0u8..3, 16),
    ) {
        let mut x = vec![0.0];
        for w in &widths {
            x.push(x.last().unwrap() + w);
        }

        let mut insert_one = Vec::new();
        let mut insert_two = Vec::new();
        for (j, &flag) in flags.iter().take(widths.len()).enumerate() {
            match flag {
                1 => insert_one.push(j),
                2 => insert_two.push(j),
                _ => {}
            }
        }

        let refined = modify_mesh(&x, &insert_one, &insert_two);

        prop_assert_eq!(refined.len(), x.len() + insert_one.len() + 2 * insert_two.len());
        prop_assert!(refined.windows(2).all(|w| w[1] > w[0]));
        // Every original node survives.
        for node in &x {
            prop_assert!(refined.iter().any(|r| r == node));
        }
        // Empty insertion is the identity.
        if insert_one.is_empty() && insert_two.is_empty() {
            prop_assert_eq!(refined, x);
        }
    }

    #[test]
    fn spline_reproduces_arbitrary_node_data(
        widths in prop::collection::vec(0.05f64..1.0, 1..10),
        seeds in prop::collection::vec(-5.0f64..5.0, 2..22),
    ) {
        let mut x = vec![0.0];
        for w in &widths {
            x.push(x.last().unwrap() + w);
        }
        let m = x.len();
        let h = interval_widths(&x);

        let y = Mat::from_fn(1, m, |_, j| seeds[j % seeds.len()]);
        let yp = Mat::from_fn(1, m, |_, j| seeds[(j + 1) % seeds.len()]);

        let spline = CubicSpline::new(&x, &h, y.as_ref(), yp.as_ref());
        for (j, &t) in x.iter().enumerate() {
            prop_assert!((spline.value(t)[0] - y[(0, j)]).abs() < 1e-9);
            prop_assert!((spline.derivative(t)[0] - yp[(0, j)]).abs() < 1e-8);
        }
    }
}
