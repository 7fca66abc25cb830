// ==========================================
// 流转场景测试
// ==========================================
// 职责: 验证数量守恒、重复动作防护、面别校验、状态转换与路由
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod movement_scenarios_test {
    use lot_trace::api::ApiError;
    use lot_trace::domain::scan::CheckpointScan;
    use lot_trace::domain::types::{LotState, MovementAction, Phase, PhaseConfig};
    use lot_trace::engine::phase_policy::PhaseMarks;

    use crate::test_helpers::{count_rows, create_lot, create_order, reload_lot, request, setup_state};

    // ==========================================
    // 场景 1: 拆分
    // ==========================================

    #[test]
    fn test_split_creates_child_and_conserves_quantity() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);
        assert_eq!(lot.capacity, 50);
        assert_eq!(lot.remaining, 50);

        let outcome = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();

        assert_eq!(outcome.source_lot.remaining, 30);
        assert_eq!(outcome.child_lot.total_at_creation, 20);
        assert_eq!(outcome.child_lot.remaining, 20);
        assert_eq!(outcome.child_lot.sector, "SMT");
        assert_eq!(outcome.child_lot.state, LotState::Disponivel);
        assert_eq!(outcome.child_lot.top_done, 20);
        assert_eq!(outcome.child_lot.bottom_done, 0);
        assert_eq!(outcome.child_lot.parent_lot_id, Some(lot.lot_id));
        assert_eq!(outcome.lineage_root_id, lot.lot_id);

        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.phase, Phase::Top);
        assert_eq!(record.source_lot_id, lot.lot_id);
        assert_eq!(record.result_lot_id, outcome.child_lot.lot_id);
        assert_eq!(record.from_sector, "PTH");
        assert_eq!(record.to_sector, "SMT");
        assert_eq!(record.actor, "tester");

        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 30);
        assert_eq!(count_rows(&db_path, "movement"), 1);
    }

    // ==========================================
    // 场景 2: 重复动作
    // ==========================================

    #[test]
    fn test_duplicate_action_is_rejected_across_lineage() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let req = request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top());
        let first = state.movement_api.submit(&req).unwrap();

        for _ in 0..2 {
            let err = state.movement_api.submit(&req).unwrap_err();
            assert!(matches!(err, ApiError::DuplicateAction(_)), "unexpected: {:?}", err);
        }

        // 子批次与根批次属于同一谱系
        let from_child = request(
            first.child_lot.lot_id,
            "gate-1",
            MovementAction::Producao,
            Some(5),
            PhaseMarks::top(),
        );
        let err = state.movement_api.submit(&from_child).unwrap_err();
        assert!(matches!(err, ApiError::DuplicateAction(_)));

        // 动作大小写不影响判定
        let err = state
            .movement_api
            .submit_scan(&CheckpointScan {
                model_code: "m1".to_string(),
                lot_code: "01/900".to_string(),
                checkpoint_id: "gate-1".to_string(),
                action: "producao".to_string(),
                quantity: Some(1),
                top_mark: true,
                bottom_mark: false,
                actor: None,
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateAction(_)));

        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 30);
        assert_eq!(count_rows(&db_path, "movement"), 1);

        // 另一面别不算重复
        state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(10), PhaseMarks::bottom()))
            .unwrap();
    }

    // ==========================================
    // 场景 3: 超量
    // ==========================================

    #[test]
    fn test_over_transfer_is_rejected_without_mutation() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();
        let movements_before = count_rows(&db_path, "movement");
        let history_before = count_rows(&db_path, "order_history");

        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Recebimento, Some(40), PhaseMarks::top()))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)), "unexpected: {:?}", err);

        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-2", MovementAction::Producao, Some(0), PhaseMarks::top()))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 30);
        assert_eq!(count_rows(&db_path, "movement"), movements_before);
        assert_eq!(count_rows(&db_path, "order_history"), history_before);
        assert_eq!(count_rows(&db_path, "lot"), 2);
    }

    // ==========================================
    // 场景 4: 面别配置
    // ==========================================

    #[test]
    fn test_phase_config_rejects_disallowed_mark() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M2", PhaseConfig::TopOnly, None);
        let lot = create_lot(&state, order_id, 50);

        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(10), PhaseMarks::bottom()))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 50);

        // 单面订单同样必须标记面别
        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(10), PhaseMarks::none()))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let outcome = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(10), PhaseMarks::top()))
            .unwrap();
        assert_eq!(outcome.records[0].phase, Phase::Top);
    }

    #[test]
    fn test_both_marks_on_bottom_only_order_is_rejected() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "B1", PhaseConfig::BottomOnly, None);
        let lot = create_lot(&state, order_id, 50);

        let err = state
            .movement_api
            .submit(&request(
                lot.lot_id,
                "gate-1",
                MovementAction::Producao,
                Some(10),
                PhaseMarks::new(true, true),
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)), "unexpected: {:?}", err);
        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 50);
        assert_eq!(count_rows(&db_path, "movement"), 0);
    }

    #[test]
    fn test_both_marks_collapse_to_top() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let outcome = state
            .movement_api
            .submit(&request(
                lot.lot_id,
                "gate-1",
                MovementAction::Producao,
                Some(10),
                PhaseMarks::new(true, true),
            ))
            .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].phase, Phase::Top);
        assert_eq!(outcome.child_lot.top_done, 10);
        assert_eq!(outcome.child_lot.bottom_done, 0);
    }

    #[test]
    fn test_no_mark_on_two_sided_order_is_rejected() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(10), PhaseMarks::none()))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    // ==========================================
    // 状态转换与路由
    // ==========================================

    #[test]
    fn test_quantity_defaults_to_capacity() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let outcome = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Recebimento, None, PhaseMarks::top()))
            .unwrap();
        assert_eq!(outcome.child_lot.total_at_creation, 50);
        assert_eq!(outcome.child_lot.state, LotState::Aguardando);
        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 0);
    }

    #[test]
    fn test_default_capacity_above_remaining_is_rejected() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();

        // 容量 50 > 剩余 30
        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-2", MovementAction::Producao, None, PhaseMarks::top()))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 30);
    }

    #[test]
    fn test_huge_quantity_is_rejected_and_connection_stays_usable() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let first = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();
        assert_eq!(first.child_lot.top_done, 20);

        let err = state
            .movement_api
            .submit(&request(
                first.child_lot.lot_id,
                "gate-2",
                MovementAction::Producao,
                Some(i64::MAX),
                PhaseMarks::top(),
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)), "unexpected: {:?}", err);
        assert_eq!(reload_lot(&db_path, first.child_lot.lot_id).remaining, 20);

        let next = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-2", MovementAction::Producao, Some(10), PhaseMarks::top()))
            .unwrap();
        assert_eq!(next.source_lot.remaining, 20);
    }

    #[test]
    fn test_quality_station_keeps_sector_and_resets_counters() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let produced = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, None, PhaseMarks::top()))
            .unwrap();
        assert_eq!(produced.child_lot.top_done, 50);

        let received = state
            .movement_api
            .submit(&request(
                produced.child_lot.lot_id,
                "cq-1",
                MovementAction::Recebimento,
                None,
                PhaseMarks::top(),
            ))
            .unwrap();
        assert_eq!(received.child_lot.state, LotState::PendenteCq);
        assert_eq!(received.child_lot.sector, "SMT");
        assert_eq!(received.child_lot.top_done, 0);
        assert_eq!(received.child_lot.bottom_done, 0);

        let approved = state
            .movement_api
            .submit(&request(received.child_lot.lot_id, "cq-1", MovementAction::Cq, None, PhaseMarks::top()))
            .unwrap();
        assert_eq!(approved.child_lot.state, LotState::CqAprovou);
        assert_eq!(approved.child_lot.depth, 3);
        assert_eq!(approved.lineage_root_id, lot.lot_id);
    }

    #[test]
    fn test_invalid_transition_is_validation_error() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Cq, Some(10), PhaseMarks::top()))
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");

        let err = state
            .movement_api
            .submit(&request(lot.lot_id, "nowhere", MovementAction::Producao, Some(10), PhaseMarks::top()))
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 50);
    }

    #[test]
    fn test_shipping_is_terminal() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let shipped = state
            .movement_api
            .submit(&request(lot.lot_id, "ship-1", MovementAction::Producao, None, PhaseMarks::top()))
            .unwrap();
        assert_eq!(shipped.child_lot.state, LotState::Expedido);
        assert_eq!(shipped.child_lot.sector, "EXPEDICAO");

        let err = state
            .movement_api
            .submit(&request(
                shipped.child_lot.lot_id,
                "gate-2",
                MovementAction::Recebimento,
                None,
                PhaseMarks::top(),
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_im_pa_destination_follows_order_sector() {
        let (_tmp, _db_path, state) = setup_state();
        let pa_order = create_order(&state, "PA1", PhaseConfig::TopBottom, Some("PA"));
        let other_order = create_order(&state, "SM1", PhaseConfig::TopBottom, Some("SMT"));
        let pa_lot = create_lot(&state, pa_order, 10);
        let other_lot = create_lot(&state, other_order, 10);
        assert_eq!(pa_lot.sector, "PA");
        assert_eq!(other_lot.sector, "SMT");

        let to_pa = state
            .movement_api
            .submit(&request(pa_lot.lot_id, "Ponto-04", MovementAction::Producao, None, PhaseMarks::top()))
            .unwrap();
        assert_eq!(to_pa.child_lot.sector, "PA");

        let to_im = state
            .movement_api
            .submit(&request(other_lot.lot_id, "Ponto-04", MovementAction::Producao, None, PhaseMarks::top()))
            .unwrap();
        assert_eq!(to_im.child_lot.sector, "IM");
    }

    // ==========================================
    // 扫描入口
    // ==========================================

    #[test]
    fn test_submit_scan_resolves_codes() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let outcome = state
            .movement_api
            .submit_scan(&CheckpointScan {
                model_code: " m1 ".to_string(),
                lot_code: "01/900".to_string(),
                checkpoint_id: "gate-1".to_string(),
                action: "Producao".to_string(),
                quantity: Some(15),
                top_mark: false,
                bottom_mark: true,
                actor: None,
            })
            .unwrap();

        assert_eq!(outcome.source_lot.lot_id, lot.lot_id);
        assert_eq!(outcome.records[0].phase, Phase::Bottom);
        assert_eq!(outcome.records[0].actor, state.engine_config.default_actor);
        assert_eq!(outcome.child_lot.bottom_done, 15);
        assert_eq!(reload_lot(&db_path, lot.lot_id).remaining, 35);
    }

    #[test]
    fn test_submit_scan_unknown_codes() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        create_lot(&state, order_id, 50);

        let scan = |model: &str, lot: &str, action: &str| CheckpointScan {
            model_code: model.to_string(),
            lot_code: lot.to_string(),
            checkpoint_id: "gate-1".to_string(),
            action: action.to_string(),
            quantity: Some(1),
            top_mark: true,
            bottom_mark: false,
            actor: None,
        };

        let err = state.movement_api.submit_scan(&scan("XX", "01 / 900", "PRODUCAO")).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = state.movement_api.submit_scan(&scan("M1", "77 / 900", "PRODUCAO")).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = state.movement_api.submit_scan(&scan("M1", "01 / 900", "EMBALAGEM")).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = state.movement_api.submit_scan(&scan("", "01 / 900", "PRODUCAO")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_history_entry_per_movement() {
        let (_tmp, db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);
        assert_eq!(count_rows(&db_path, "order_history"), 1);

        state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();

        let view = state.dashboard_api.order_history(order_id).unwrap();
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[0].changed_by, "tester");
        assert!(view.history[0].change_text.contains("PRODUCAO em gate-1"));
        assert!(view.history[0].change_text.contains("qtd: 20"));
    }
}
