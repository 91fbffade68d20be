use featurevis::Error;
use featurevis::device::Device;
use featurevis::domain::{History, Input, State};
use featurevis::modelio::{load_tensors, save_tensors};
use featurevis::tensors::Tensor;
use featurevis::variable::Variable;
use std::path::PathBuf;

use rand::Rng;

fn random_tensor(shape: Vec<usize>) -> Tensor {
    let mut rng = rand::rng();
    let len = shape.iter().product::<usize>();
    let data = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
    Tensor::new(shape, data)
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("featurevis-{name}-{}.bpat", std::process::id()))
}

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| {
        Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
    });
    assert!(result.is_err());
}

#[test]
fn test_bpat_save_and_load() {
    let a = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = Tensor::new(vec![1, 4], vec![7.0, 8.0, 9.0, 10.0]);
    let c = Tensor::scalar(0.5);
    let original = vec![a, b, c];

    let path = temp_path("save-load");
    save_tensors(&path, &original).unwrap();
    let loaded = load_tensors(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(original, loaded);
}

#[test]
fn test_bpat_rejects_bad_magic() {
    let path = temp_path("bad-magic");
    std::fs::write(&path, b"nope\x00").unwrap();
    let err = load_tensors(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, Error::InvalidMagic));
}

#[test]
fn test_bpat_truncated_file_is_io_error() {
    let path = temp_path("truncated");
    std::fs::write(&path, b"bpat\x01\x02\x00").unwrap();
    let err = load_tensors(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_extracted_inputs_survive_save_and_load() {
    let image = Variable::new_on(random_tensor(vec![1, 3, 4, 4]), Device::Cpu);
    let input = Input::new(image);
    let extracted = input.extract().to_tensor();
    assert_eq!(extracted.shape, vec![3, 4, 4]);

    let path = temp_path("extracted");
    save_tensors(&path, std::slice::from_ref(&extracted)).unwrap();
    let loaded = load_tensors(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, vec![extracted]);
}

#[test]
fn test_history_keeps_best_extracted_input() {
    let mut history = History::with_capacity_limit(3).unwrap();
    let input = Input::new(Variable::new_on(random_tensor(vec![1, 2, 2]), Device::Cpu));

    for i_iter in 0..5 {
        let snapshot = input.extract();
        let evaluation = [0.1, 0.9, 0.3, 0.4, 0.2][i_iter];
        history.push(State::new(
            i_iter,
            evaluation,
            snapshot.clone(),
            snapshot.clone(),
            snapshot.clone(),
            snapshot.clone(),
            snapshot.clone(),
            snapshot,
        ));
        input.data().update_values(|v| v.iter_mut().for_each(|x| *x += 1.0));
    }

    assert_eq!(history.len(), 3);
    let best = history.best_by_evaluation().unwrap();
    assert_eq!(best.i_iter(), 3);
    assert_eq!(best.input().shape(), vec![2, 2]);

    let states = history.into_vec();
    let iters: Vec<usize> = states.iter().map(State::i_iter).collect();
    assert_eq!(iters, vec![2, 3, 4]);
}
