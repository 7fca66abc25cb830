// ==========================================
// 驾驶舱、历史查看与配置测试
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod dashboard_test {
    use lot_trace::api::ApiError;
    use lot_trace::app::AppState;
    use lot_trace::config::config_keys;
    use lot_trace::domain::types::{LotState, MovementAction, Phase, PhaseConfig};
    use lot_trace::engine::phase_policy::{PhaseConflictPolicy, PhaseMarks};

    use crate::test_helpers::{
        create_lot, create_order, create_test_db, request, setup_state, test_routing_table, write_config,
        write_routing,
    };

    #[test]
    fn test_order_overview_aggregates_from_lots_and_movements() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let smt_child = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap()
            .child_lot;
        state
            .movement_api
            .submit(&request(lot.lot_id, "gate-2", MovementAction::Recebimento, Some(5), PhaseMarks::bottom()))
            .unwrap();

        let overview = state.dashboard_api.order_overview(order_id).unwrap();
        assert_eq!(overview.order.code, "M1");

        let find = |sector: &str, state: LotState| {
            overview
                .balances
                .iter()
                .find(|b| b.sector == sector && b.state == state)
                .cloned()
        };
        // 初始批次保持 AGUARDANDO
        let pth = find("PTH", LotState::Aguardando).unwrap();
        assert_eq!(pth.remaining, 25);
        assert_eq!(pth.status, LotState::Aguardando);
        let smt = find("SMT", LotState::Disponivel).unwrap();
        assert_eq!(smt.remaining, 20);
        assert_eq!(smt.status, LotState::Disponivel);
        let im = find("IM", LotState::Aguardando).unwrap();
        assert_eq!(im.remaining, 5);
        assert_eq!(im.status, LotState::Aguardando);

        // 只有 PRODUCAO 计入产量
        assert_eq!(overview.production.len(), 1);
        assert_eq!(overview.production[0].sector, "SMT");
        assert_eq!(overview.production[0].phase, Phase::Top);
        assert_eq!(overview.production[0].produced, 20);

        let smt_done = overview.completion.iter().find(|c| c.sector == "SMT").unwrap();
        assert_eq!(smt_done.top_done, 20);
        assert_eq!(smt_done.bottom_done, 0);
        let im_done = overview.completion.iter().find(|c| c.sector == "IM").unwrap();
        assert_eq!(im_done.bottom_done, 5);

        // 余量耗尽的 DISPONIVEL 分组显示 AGUARDANDO
        state
            .movement_api
            .submit(&request(smt_child.lot_id, "gate-2", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();
        let overview = state.dashboard_api.order_overview(order_id).unwrap();
        let smt = overview
            .balances
            .iter()
            .find(|b| b.sector == "SMT" && b.state == LotState::Disponivel)
            .unwrap();
        assert_eq!(smt.remaining, 0);
        assert_eq!(smt.status, LotState::Aguardando);

        let all = state.dashboard_api.overview_all().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_order_history_view() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(20), PhaseMarks::top()))
            .unwrap();

        let view = state.dashboard_api.order_history(order_id).unwrap();
        assert_eq!(view.movements.len(), 1);
        assert_eq!(view.lots.len(), 2);
        assert_eq!(view.history.len(), 2);
        assert!(view.history[1].change_text.starts_with("Lotes gerados"));

        assert!(matches!(
            state.dashboard_api.order_history(order_id + 99),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_lot_trace_follows_lineage() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let first = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(30), PhaseMarks::top()))
            .unwrap();
        let second = state
            .movement_api
            .submit(&request(
                first.child_lot.lot_id,
                "gate-2",
                MovementAction::Recebimento,
                Some(10),
                PhaseMarks::top(),
            ))
            .unwrap();

        let trace = state.dashboard_api.lot_trace(second.child_lot.lot_id).unwrap();
        assert_eq!(trace.lineage.root_lot_id, lot.lot_id);
        assert_eq!(trace.lineage.hops, 2);
        assert!(!trace.lineage.truncated);
        assert!(trace.children.is_empty());
        assert_eq!(trace.movements.len(), 1);

        let middle = state.dashboard_api.lot_trace(first.child_lot.lot_id).unwrap();
        assert_eq!(middle.children.len(), 1);
        assert_eq!(middle.movements.len(), 2);

        assert!(matches!(state.dashboard_api.lot_trace(9999), Err(ApiError::NotFound(_))));
    }

    // ==========================================
    // 配置驱动的行为
    // ==========================================

    #[test]
    fn test_lineage_depth_cap_from_config() {
        let (_tmp, db_path) = create_test_db().unwrap();
        write_routing(&db_path, &test_routing_table()).unwrap();
        write_config(&db_path, config_keys::LINEAGE_MAX_HOPS, "2").unwrap();
        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.engine_config.max_hops, 2);

        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
        let lot = create_lot(&state, order_id, 50);

        let first = state
            .movement_api
            .submit(&request(lot.lot_id, "gate-1", MovementAction::Producao, Some(30), PhaseMarks::top()))
            .unwrap();
        let second = state
            .movement_api
            .submit(&request(
                first.child_lot.lot_id,
                "gate-2",
                MovementAction::Producao,
                Some(20),
                PhaseMarks::top(),
            ))
            .unwrap();
        assert_eq!(second.child_lot.depth, 2);

        let err = state
            .movement_api
            .submit(&request(
                second.child_lot.lot_id,
                "Ponto-02",
                MovementAction::Producao,
                Some(10),
                PhaseMarks::top(),
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)), "unexpected: {:?}", err);
    }

    #[test]
    fn test_reject_policy_refuses_both_marks() {
        let (_tmp, db_path) = create_test_db().unwrap();
        write_routing(&db_path, &test_routing_table()).unwrap();
        write_config(&db_path, config_keys::PHASE_CONFLICT_POLICY, "REJECT").unwrap();
        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.engine_config.phase_conflict_policy, PhaseConflictPolicy::Reject);

        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);
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
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_malformed_routing_table_fails_startup() {
        let (_tmp, db_path) = create_test_db().unwrap();
        write_config(&db_path, config_keys::ROUTING_TABLE, "{not json").unwrap();
        assert!(AppState::new(db_path).is_err());
    }

    #[test]
    fn test_label_lots_split_by_capacity() {
        let (_tmp, _db_path, state) = setup_state();
        let order_id = create_order(&state, "M1", PhaseConfig::TopBottom, None);

        let lots = state.label_api.create_lots(order_id, 250, 100).unwrap();
        let quantities: Vec<i64> = lots.iter().map(|l| l.remaining).collect();
        assert_eq!(quantities, vec![100, 100, 50]);
        assert!(lots.iter().all(|l| l.parent_lot_id.is_none() && l.depth == 0));
        assert_eq!(lots[0].lot_code, "01 / 900");
        assert_eq!(lots[2].lot_code, "03 / 900");

        assert!(state.label_api.create_lots(order_id, 0, 100).is_err());
    }
}
