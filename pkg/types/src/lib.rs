pub mod metric;
pub mod pod;
pub mod quantity;
pub mod selector;
pub mod spec;
pub mod workload;

pub use metric::{
    Evaluation, ExternalMeasurement, GatheredMetric, Measurement, ObjectMeasurement,
    PodClassification, PodSample, PodSampleMap, PodsMeasurement, ResourceMeasurement,
};
pub use pod::{ConditionStatus, ContainerRecord, PodPhase, PodRecord, ReadyCondition, ResourceName};
pub use quantity::Quantity;
pub use selector::Selector;
pub use spec::{MetricIdentifier, MetricSpec, MetricTarget, ObjectReference};
pub use workload::{ObjectMeta, ScaleTarget, SelectorSpec, Workload, WorkloadError, WorkloadSpec};
