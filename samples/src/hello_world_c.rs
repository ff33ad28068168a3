//! 不经过加速器，直接在主机上逐元素相加。

pub fn vector_add(a: &[i32], b: &[i32]) -> Vec<i32> {
    a.iter().zip(b).map(|(a, b)| a.wrapping_add(*b)).collect()
}

#[test]
fn test_vector_add() {
    let a = (0..1000).collect::<Vec<i32>>();
    let ans = vector_add(&a, &a);
    assert!(ans.iter().enumerate().all(|(i, &x)| x == 2 * i as i32));
}
