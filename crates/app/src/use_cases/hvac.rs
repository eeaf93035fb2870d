//! Monitoring and control of smart-grid-ready conditions (HVAC overruns).

use cem_domain::error::CemError;
use cem_domain::event::DataPayload;
use cem_domain::feature::{FeatureType, FunctionType, UseCaseName, UseCaseSupport};
use cem_domain::hvac::{HvacOverrun, HvacOverrunDescription, HvacSnapshot, OverrunOverrideRequest};
use cem_domain::ski::Ski;

use super::{UseCase, UseCaseProfile};
use crate::link;
use crate::ports::{HvacDelegate, Transport};

/// HVAC use case driving delegate `D`.
pub type HvacUseCase<T, D> = UseCase<T, Hvac<D>>;

/// Reads HVAC server features and reports annotated overrun states.
///
/// Heat pumps are polled by default. Under polling, overrun notifications
/// pushed by the device are logged at debug level and dropped, the next poll
/// reads the same state. Install with
/// [`RefreshStrategy::SubscriptionPush`](crate::refresh::RefreshStrategy::SubscriptionPush)
/// to refresh on every notification instead; single overrun notifications
/// then run a cycle as a one-entry list.
pub struct Hvac<D> {
    delegate: D,
}

impl<D: HvacDelegate> Hvac<D> {
    #[must_use]
    pub fn new(delegate: D) -> Self {
        Self { delegate }
    }
}

impl<D: HvacDelegate> UseCaseProfile for Hvac<D> {
    type Value = HvacOverrun;
    type Description = HvacOverrunDescription;

    const NAME: &'static str = "hvac";
    const FEATURE: FeatureType = FeatureType::Hvac;
    const CLIENT_DESCRIPTION: &'static str = "Hvac Client";
    const VALUE_FUNCTION: FunctionType = FunctionType::HvacOverrunListData;
    const DESCRIPTION_FUNCTION: FunctionType = FunctionType::HvacOverrunDescriptionListData;

    fn support() -> UseCaseSupport {
        UseCaseSupport::new(
            UseCaseName::MonitoringAndControlOfSmartGridReadyConditions,
            "1.0.0",
            vec![1, 2],
        )
    }

    /// Overrun lists, and single overrun notifications as a one-entry list.
    fn values(payload: DataPayload) -> Result<Vec<HvacOverrun>, DataPayload> {
        match payload {
            DataPayload::HvacOverrunListData(overruns) => Ok(overruns),
            DataPayload::HvacOverrunData(overrun) => Ok(vec![overrun]),
            other => Err(other),
        }
    }

    fn descriptions(payload: DataPayload) -> Result<Vec<HvacOverrunDescription>, DataPayload> {
        match payload {
            DataPayload::HvacOverrunDescriptionListData(descriptions) => Ok(descriptions),
            other => Err(other),
        }
    }

    fn deliver(&self, ski: &Ski, snapshot: HvacSnapshot) {
        self.delegate.on_hvac_snapshot(ski, snapshot);
    }

    fn cycle_failed(&self, ski: &Ski, err: &CemError) {
        self.delegate.on_cycle_failed(ski, err);
    }
}

impl<T, D> UseCase<T, Hvac<D>>
where
    T: Transport + 'static,
    D: HvacDelegate,
{
    /// Write the overrun list with only `active_index` active.
    ///
    /// # Errors
    ///
    /// Returns [`CemError::Validation`] for an index outside the overrun
    /// slots, [`CemError::AddressResolution`] when the HVAC server of `ski`
    /// cannot be resolved (nothing is written in both cases), and
    /// [`CemError::DataWrite`] when the write fails.
    #[tracing::instrument(skip(self))]
    pub async fn set_overrun(&self, ski: &Ski, active_index: usize) -> Result<(), CemError> {
        let request = OverrunOverrideRequest::activate(active_index)?;
        self.write_overruns(ski, request).await
    }

    /// Write the overrun list with every slot inactive.
    ///
    /// # Errors
    ///
    /// Same as [`set_overrun`](Self::set_overrun), minus validation.
    #[tracing::instrument(skip(self))]
    pub async fn clear_overrun(&self, ski: &Ski) -> Result<(), CemError> {
        self.write_overruns(ski, OverrunOverrideRequest::clear()).await
    }

    async fn write_overruns(
        &self,
        ski: &Ski,
        request: OverrunOverrideRequest,
    ) -> Result<(), CemError> {
        let link = link::client_link(&self.inner.transport, ski, FeatureType::Hvac)?;
        let active = request.active_index();

        self.inner
            .transport
            .write_data(
                &link.local,
                &link.remote,
                DataPayload::HvacOverrunListData(request.hvac_overrun_data),
            )
            .await
            .map_err(CemError::DataWrite)?;

        tracing::info!(remote = %link.remote, ?active, "overrun override written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use cem_domain::error::{AddressResolutionError, ValidationError};
    use cem_domain::event::ElementChange;
    use cem_domain::hvac::{HvacOverrunStatus, HvacOverrunType};
    use tokio_util::sync::CancellationToken;

    use crate::ports::UseCaseEventHandler;
    use crate::refresh::RefreshStrategy;
    use crate::testing::{Delivery, FakeTransport, RecordingDelegate, evse, heat_pump, ski};

    type Subject = HvacUseCase<Arc<FakeTransport>, RecordingDelegate>;

    fn install(
        strategy: RefreshStrategy,
    ) -> (
        Arc<FakeTransport>,
        Subject,
        tokio::sync::mpsc::UnboundedReceiver<Delivery>,
    ) {
        let transport = Arc::new(FakeTransport::new());
        transport.script(
            FunctionType::HvacOverrunDescriptionListData,
            vec![Ok(DataPayload::HvacOverrunDescriptionListData(vec![
                HvacOverrunDescription::new(0, HvacOverrunType::OneTimeDhw, "hot water"),
                HvacOverrunDescription::new(1, HvacOverrunType::Sgready, "sg ready"),
            ]))],
        );
        transport.script(
            FunctionType::HvacOverrunListData,
            vec![Ok(DataPayload::HvacOverrunListData(vec![
                HvacOverrun::new(0, HvacOverrunStatus::Inactive),
                HvacOverrun::new(1, HvacOverrunStatus::Running),
            ]))],
        );
        let (delegate, rx) = RecordingDelegate::new();
        let use_case = UseCase::install(
            Arc::clone(&transport),
            Hvac::new(delegate),
            strategy,
            &CancellationToken::new(),
        );
        (transport, use_case, rx)
    }

    fn written_statuses(transport: &FakeTransport) -> Vec<Option<HvacOverrunStatus>> {
        let writes = transport.writes.lock().unwrap();
        match &writes.last().unwrap().1 {
            DataPayload::HvacOverrunListData(overruns) => {
                overruns.iter().map(|o| o.overrun_status).collect()
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn should_accept_single_overrun_notification_as_values() {
        let single = DataPayload::HvacOverrunData(HvacOverrun::new(2, HvacOverrunStatus::Active));
        let values = Hvac::<RecordingDelegate>::values(single).unwrap();
        assert_eq!(values, vec![HvacOverrun::new(2, HvacOverrunStatus::Active)]);
    }

    #[tokio::test]
    async fn should_install_hvac_client_and_announce_sg_ready_scenarios() {
        let (transport, _use_case, _rx) = install(RefreshStrategy::default());

        assert!(
            transport
                .local_feature(FeatureType::Hvac, cem_domain::feature::Role::Client)
                .is_some()
        );
        let announcements = transport.announcements.lock().unwrap();
        assert_eq!(
            announcements[0].name,
            UseCaseName::MonitoringAndControlOfSmartGridReadyConditions
        );
        assert_eq!(announcements[0].scenarios, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_deliver_overruns_annotated_with_descriptions() {
        let (transport, use_case, mut rx) =
            install(RefreshStrategy::polling(Duration::from_secs(5)));
        let device = transport.add_device(heat_pump("ski-1"));

        use_case
            .on_device_change(ElementChange::Add, device)
            .await
            .unwrap();

        let Delivery::Hvac(snapshot) = rx.recv().await.unwrap() else {
            panic!("expected an hvac snapshot");
        };
        assert_eq!(snapshot.len(), 2);
        let labels: Vec<_> = snapshot
            .entries
            .iter()
            .map(|e| e.description.as_ref().and_then(|d| d.label.clone()))
            .collect();
        assert_eq!(
            labels,
            vec![Some("hot water".to_owned()), Some("sg ready".to_owned())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_overrun_notifications_while_polling() {
        let (transport, use_case, mut rx) =
            install(RefreshStrategy::polling(Duration::from_secs(5)));
        let device = transport.add_device(heat_pump("ski-1"));

        use_case
            .on_device_change(ElementChange::Add, device)
            .await
            .unwrap();
        use_case
            .on_data_change(
                ElementChange::Update,
                ski("ski-1"),
                DataPayload::HvacOverrunData(HvacOverrun::new(1, HvacOverrunStatus::Active)),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(transport.requests(FunctionType::HvacOverrunListData), 0);
        assert!(transport.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_refresh_on_overrun_notification_under_push() {
        let (transport, use_case, mut rx) = install(RefreshStrategy::SubscriptionPush);
        let device = transport.add_device(heat_pump("ski-1"));

        use_case
            .on_device_change(ElementChange::Add, device)
            .await
            .unwrap();
        use_case
            .on_data_change(
                ElementChange::Update,
                ski("ski-1"),
                DataPayload::HvacOverrunData(HvacOverrun::new(1, HvacOverrunStatus::Active)),
            )
            .await
            .unwrap();

        let Delivery::Hvac(snapshot) = rx.recv().await.unwrap() else {
            panic!("expected an hvac snapshot");
        };
        let statuses: Vec<_> = snapshot.values().map(|o| o.overrun_status).collect();
        assert_eq!(statuses, vec![Some(HvacOverrunStatus::Active)]);
        assert_eq!(transport.requests(FunctionType::HvacOverrunListData), 0);
    }

    #[tokio::test]
    async fn should_write_three_overruns_with_requested_slot_active() {
        let (transport, use_case, _rx) = install(RefreshStrategy::default());
        let device = transport.add_device(heat_pump("ski-1"));

        use_case.set_overrun(&ski("ski-1"), 1).await.unwrap();

        let writes = transport.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            Some(&writes[0].0),
            device
                .feature(
                    cem_domain::device::PRIMARY_ENTITY,
                    FeatureType::Hvac,
                    cem_domain::feature::Role::Server
                )
                .map(|f| &f.address)
        );
        assert_eq!(
            written_statuses(&transport),
            vec![
                Some(HvacOverrunStatus::Inactive),
                Some(HvacOverrunStatus::Active),
                Some(HvacOverrunStatus::Inactive),
            ]
        );
    }

    #[tokio::test]
    async fn should_reject_out_of_range_index_without_writing() {
        let (transport, use_case, _rx) = install(RefreshStrategy::default());
        transport.add_device(heat_pump("ski-1"));

        let err = use_case.set_overrun(&ski("ski-1"), 3).await.unwrap_err();

        assert!(matches!(
            err,
            CemError::Validation(ValidationError::OverrunIndexOutOfRange { index: 3, .. })
        ));
        assert!(transport.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_clear_every_overrun() {
        let (transport, use_case, _rx) = install(RefreshStrategy::default());
        transport.add_device(heat_pump("ski-1"));

        use_case.clear_overrun(&ski("ski-1")).await.unwrap();

        assert_eq!(
            written_statuses(&transport),
            vec![Some(HvacOverrunStatus::Inactive); 3]
        );
    }

    #[tokio::test]
    async fn should_not_write_overruns_to_device_without_hvac_server() {
        let (transport, use_case, _rx) = install(RefreshStrategy::default());
        transport.add_device(evse("ski-1"));

        let err = use_case.set_overrun(&ski("ski-1"), 0).await.unwrap_err();

        assert!(matches!(
            err,
            CemError::AddressResolution(AddressResolutionError::MissingRemoteFeature { .. })
        ));
        assert!(transport.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_surface_rejected_overrun_write() {
        let (transport, use_case, _rx) = install(RefreshStrategy::default());
        transport.add_device(heat_pump("ski-1"));
        transport.fail_writes.store(true, Ordering::SeqCst);

        let err = use_case.set_overrun(&ski("ski-1"), 0).await.unwrap_err();

        assert!(matches!(err, CemError::DataWrite(_)));
    }

    #[tokio::test]
    async fn should_bind_hvac_feature() {
        let (transport, use_case, _rx) = install(RefreshStrategy::default());
        transport.add_device(heat_pump("ski-1"));

        use_case.bind(&ski("ski-1")).await.unwrap();

        let bindings = transport.bindings.lock().unwrap();
        assert_eq!(bindings[0].1.server_feature_type, FeatureType::Hvac);
    }
}
