use crate::geometry::Point;
use crate::models::common::*;

/// 他エージェントを探知できるエージェントのインターフェース
pub trait Detector {
    /// 対象区分ごとの探知技能（None は探知不能）
    fn detection_skill(&self, domain: Domain) -> Option<Skill>;

    /// 自身のプラットフォーム区分
    fn platform_domain(&self) -> Domain;

    /// 対潜戦システムの有無
    fn has_aws(&self) -> bool;

    fn sensor_position(&self) -> Point;

    fn can_detect(&self, domain: Domain) -> bool {
        self.detection_skill(domain).is_some()
    }
}

/// 探知対象として観測されるエージェントのインターフェース
pub trait Observable {
    fn target_domain(&self) -> Domain;

    fn size_class(&self) -> SizeClass;

    fn position(&self) -> Point;
}

/// 攻撃能力を持つエージェントのインターフェース
pub trait Attacker {
    /// 対象区分ごとの攻撃技能（None は攻撃不能）
    fn attack_skill(&self, domain: Domain) -> Option<Skill>;

    /// 対象区分ごとの残弾数
    fn ammunition(&self, domain: Domain) -> u32;

    /// 1発消費する。残弾がなければ false
    fn consume_ammunition(&mut self, domain: Domain) -> bool;

    fn able_to_attack(&self, domain: Domain) -> bool {
        self.attack_skill(domain).is_some() && self.ammunition(domain) > 0
    }
}
