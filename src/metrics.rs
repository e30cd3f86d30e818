use std::sync::LazyLock;

use prometheus::*;

static METRIC_REQUEST_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "knn_request_count",
        "count of the handled requests",
        &["method", "route", "status"]
    )
    .unwrap()
});

static METRIC_CLASSIFY_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "knn_classify_duration",
        "duration of the per-request classification in seconds",
        exponential_buckets(0.0005, 2.0, 16).unwrap()
    )
    .unwrap()
});

static METRIC_TRAINING_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("knn_training_size", "number of records in the training snapshot").unwrap()
});

/// 记录一次请求
pub fn inc_request(method: &str, route: &str, status: u16) {
    let status = status.to_string();
    METRIC_REQUEST_COUNT.with_label_values(&[method, route, status.as_str()]).inc();
}

/// 记录一次分类耗时
pub fn observe_classify_duration(duration: f64) {
    METRIC_CLASSIFY_DURATION.observe(duration);
}

/// 更新训练集快照大小
pub fn set_training_size(size: usize) {
    METRIC_TRAINING_SIZE.set(size as i64);
}
