use featurevis::backprop::{mul, sum};
use featurevis::tensor;
use featurevis::tensors::Tensor;
use featurevis::variable::Variable;

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_tensor_macro() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_scalar_macro() {
    let t = tensor!(7.5);
    assert!(t.shape.is_empty());
    assert_eq!(t.numel(), 1);
}

#[test]
#[should_panic(expected = "mul shape mismatch")]
fn test_mul_shape_mismatch() {
    let x = Variable::new(tensor!([1.0, 2.0]));
    let _ = mul(&x, &tensor!([1.0]));
}

#[test]
fn test_chain_rule_through_mul_and_sum() {
    let x = Variable::new(tensor!([1.0, 2.0, 3.0]));
    let w = tensor!([2.0, 0.5, 1.0]);
    let (product, mul_back) = mul(&x, &w);
    assert_eq!(product.data, vec![2.0, 1.0, 3.0]);

    let (total, sum_back) = sum(&Variable::new(product));
    assert_eq!(total, 6.0);

    let grad_x = mul_back(&sum_back(1.0));
    assert_eq!(grad_x.data, vec![2.0, 0.5, 1.0]);
}
