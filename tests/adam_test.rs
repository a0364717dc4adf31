use lstm_lm::adam::Adam;
use ndarray::Array2;

#[test]
fn test_adam_initialization() {
    let shape = [2, 3];
    let adam = Adam::new((2, 3));

    // Check if momentum and velocity matrices are initialized to zeros
    assert_eq!(adam.m.shape(), shape);
    assert_eq!(adam.v.shape(), shape);
    assert!(adam.m.iter().all(|&x| x == 0.0));
    assert!(adam.v.iter().all(|&x| x == 0.0));
}

#[test]
fn test_adam_step() {
    let shape = (2, 2);
    let lr = 0.001;
    let mut adam = Adam::new(shape);
    let mut params = Array2::ones(shape);
    let grads = Array2::ones(shape);

    let initial_params = params.clone();
    adam.step(&mut params, &grads, lr, 1);

    assert_ne!(params, initial_params);
    // bias correction makes the first step exactly lr in size
    for &p in params.iter() {
        assert!((p - (1.0 - lr)).abs() < 1e-5);
    }
}

#[test]
fn test_adam_multiple_steps() {
    let shape = (2, 2);
    let lr = 0.001;
    let mut adam = Adam::new(shape);
    let mut params = Array2::ones(shape);
    let grads = Array2::ones(shape);

    let initial_params = params.clone();
    for t in 1..=10 {
        adam.step(&mut params, &grads, lr, t);
    }

    assert!(params.iter().all(|&x| x < initial_params[[0, 0]]));
}

#[test]
fn test_adam_with_zero_gradients() {
    let shape = (2, 2);
    let mut adam = Adam::new(shape);
    let mut params = Array2::ones(shape);
    let grads = Array2::zeros(shape);

    let initial_params = params.clone();
    adam.step(&mut params, &grads, 0.001, 1);

    // Parameters should not change with zero gradients
    assert_eq!(params, initial_params);
}

#[test]
fn test_adam_with_negative_gradients() {
    let shape = (2, 2);
    let mut adam = Adam::new(shape);
    let mut params = Array2::ones(shape);
    let grads = Array2::from_shape_fn(shape, |_| -1.0);

    adam.step(&mut params, &grads, 0.001, 1);

    // Parameters should have increased (since gradients are negative)
    assert!(params.iter().all(|&x| x > 1.0));
}

#[test]
fn test_adam_reset_clears_moments() {
    let shape = (2, 2);
    let mut adam = Adam::new(shape);
    let mut params = Array2::ones(shape);
    adam.step(&mut params, &Array2::ones(shape), 0.01, 1);
    assert!(adam.m.iter().any(|&x| x != 0.0));

    adam.reset();
    assert!(adam.m.iter().all(|&x| x == 0.0));
    assert!(adam.v.iter().all(|&x| x == 0.0));
}
